//! Wavefront OBJ/MTL parser (§4.8).
//!
//! OBJ has no nested-scope grammar at all — it's a flat list of
//! whitespace-separated directives, one per line, with `\` line
//! continuation and `#` comments (plus the non-standard `#MRGB` vertex
//! colour extension some tools emit as a comment-prefixed directive).
//! Rather than giving OBJ its own document type, this module adapts it onto
//! the same [`NodeTree`] shape the FBX tokenizers build, so `ElementReader`
//! has one input shape regardless of source format: each directive becomes
//! a node named after the directive keyword, its operands becoming values.

use crate::arena::Arena;
use crate::error::{Error, ErrorKind, Result};
use crate::node_tree::{NodeTree, RawNode, Value};
use crate::options::{IndexErrorHandling, LoadOptions};
use crate::string_pool::StringPool;

/// A parsed `f` directive vertex reference: 0-based, already resolved from
/// OBJ's 1-based/negative-relative indexing (§4.8).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VertexRef {
    pub position: u32,
    pub uv: u32,
    pub normal: u32,
}

pub const NO_REF: u32 = crate::scene::NO_INDEX;

/// One `usemtl`-scoped run of faces belongs to a face group; this is the
/// directive-level shape, later consolidated by the finalizer into mesh
/// parts.
#[derive(Clone, Debug)]
pub struct ObjFace {
    pub refs: Vec<VertexRef>,
    pub material: i32,
    pub group: i32,
    pub smoothing_group: i32,
}

/// The whole parsed `.obj` body, positions/uvs/normals plus faces and the
/// `mtllib`/`usemtl`/`g`/`o` bookkeeping needed to split it into meshes.
#[derive(Clone, Debug, Default)]
pub struct ObjDocument {
    pub positions: Vec<[f64; 3]>,
    pub uvs: Vec<[f64; 2]>,
    pub normals: Vec<[f64; 3]>,
    pub vertex_colors: Vec<[f64; 4]>,
    pub faces: Vec<ObjFace>,
    pub mtllibs: Vec<String>,
    pub materials: Vec<String>,
    pub groups: Vec<String>,
    pub objects: Vec<String>,
}

struct Counts {
    num_positions: i64,
    num_uvs: i64,
    num_normals: i64,
}

/// `Ns -> roughness` conversion used when a `.mtl` material supplies no
/// explicit `Pr` (resolution to an Open Question; see `DESIGN.md`).
pub fn ns_to_roughness(ns: f64) -> f64 {
    (2.0 / (ns + 2.0)).sqrt().clamp(0.0, 1.0)
}

pub fn parse_obj(text: &str, opts: &LoadOptions, warnings: &mut Vec<crate::error::Warning>) -> Result<ObjDocument> {
    let mut doc = ObjDocument::default();
    let mut current_material: i32 = -1;
    let mut current_group: i32 = -1;
    let mut current_smoothing: i32 = 0;

    for (line_no, raw_line) in join_continuations(text).into_iter().enumerate() {
        let line = strip_comment(&raw_line, &mut doc, warnings, line_no as u64)?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_ascii_whitespace();
        let keyword = match parts.next() {
            Some(k) => k,
            None => continue,
        };
        let rest: Vec<&str> = parts.collect();
        match keyword {
            "v" => doc.positions.push(parse_vec3(&rest, line_no as u64)?),
            "vt" => doc.uvs.push(parse_vec2(&rest, line_no as u64)?),
            "vn" => doc.normals.push(parse_vec3(&rest, line_no as u64)?),
            "f" => {
                let counts = Counts {
                    num_positions: doc.positions.len() as i64,
                    num_uvs: doc.uvs.len() as i64,
                    num_normals: doc.normals.len() as i64,
                };
                let refs = parse_face(&rest, &counts, opts, warnings, line_no as u64)?;
                doc.faces.push(ObjFace { refs, material: current_material, group: current_group, smoothing_group: current_smoothing });
            }
            "g" | "o" => {
                let name = rest.join(" ");
                let list = if keyword == "g" { &mut doc.groups } else { &mut doc.objects };
                current_group = list.len() as i32;
                list.push(name);
            }
            "s" => {
                current_smoothing = match rest.first() {
                    Some(&"off") | None => 0,
                    Some(s) => s.parse().unwrap_or(0),
                };
            }
            "usemtl" => {
                let name = rest.join(" ");
                if let Some(idx) = doc.materials.iter().position(|m| m == &name) {
                    current_material = idx as i32;
                } else {
                    current_material = doc.materials.len() as i32;
                    doc.materials.push(name);
                }
            }
            "mtllib" => doc.mtllibs.extend(rest.iter().map(|s| s.to_string())),
            _ => {
                // Unknown directives (`l`, `curv`, smoothing-unrelated
                // vendor extensions) are tolerated and dropped, matching the
                // tolerant-by-default posture everywhere else in the loader.
            }
        }
    }
    Ok(doc)
}

fn join_continuations(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();
    for raw in text.lines() {
        let trimmed_end = raw.trim_end();
        if let Some(stripped) = trimmed_end.strip_suffix('\\') {
            pending.push_str(stripped);
            pending.push(' ');
        } else {
            pending.push_str(trimmed_end);
            lines.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        lines.push(pending);
    }
    lines
}

/// Strips a `#` comment, recognizing the `#MRGB` vertex-colour extension
/// (8-digit-per-vertex hex run, `AARRGGBB`, one run per line) and
/// attributing its decoded colours to the vertices declared so far.
fn strip_comment<'a>(line: &'a str, doc: &mut ObjDocument, warnings: &mut Vec<crate::error::Warning>, line_no: u64) -> Result<&'a str> {
    if let Some(hash) = line.find('#') {
        let (before, after) = line.split_at(hash);
        let comment = after[1..].trim();
        if let Some(hex) = comment.strip_prefix("MRGB") {
            parse_mrgb(hex.trim(), doc, warnings, line_no)?;
        }
        return Ok(before);
    }
    Ok(line)
}

fn parse_mrgb(hex: &str, doc: &mut ObjDocument, warnings: &mut Vec<crate::error::Warning>, line_no: u64) -> Result<()> {
    let digits: Vec<u8> = hex.bytes().filter(|b| b.is_ascii_hexdigit()).collect();
    let full_groups = digits.len() / 8;
    let remainder = digits.len() % 8;
    if remainder != 0 {
        warnings.push(crate::error::Warning { kind: ErrorKind::BadArraySize { expected: digits.len() + (8 - remainder), found: digits.len() }, offset: Some(line_no) });
    }
    let total_groups = full_groups + if remainder != 0 { 1 } else { 0 };
    for i in 0..total_groups {
        let start = i * 8;
        let mut group = [b'0'; 8];
        let available = (digits.len() - start).min(8);
        group[..available].copy_from_slice(&digits[start..start + available]);
        // Remaining slots stay '0' (zero-padded truncated colour).
        let byte_at = |lo: usize| -> u8 {
            let s = std::str::from_utf8(&group[lo..lo + 2]).unwrap_or("00");
            u8::from_str_radix(s, 16).unwrap_or(0)
        };
        let a = byte_at(0);
        let r = byte_at(2);
        let g = byte_at(4);
        let b = byte_at(6);
        doc.vertex_colors.push([r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0, a as f64 / 255.0]);
    }
    Ok(())
}

fn parse_vec3(rest: &[&str], line_no: u64) -> Result<[f64; 3]> {
    if rest.len() < 3 {
        return Err(Error::at(ErrorKind::BadArraySize { expected: 3, found: rest.len() }, line_no));
    }
    Ok([parse_f64(rest[0], line_no)?, parse_f64(rest[1], line_no)?, parse_f64(rest[2], line_no)?])
}

fn parse_vec2(rest: &[&str], line_no: u64) -> Result<[f64; 2]> {
    if rest.len() < 2 {
        return Err(Error::at(ErrorKind::BadArraySize { expected: 2, found: rest.len() }, line_no));
    }
    Ok([parse_f64(rest[0], line_no)?, parse_f64(rest[1], line_no)?])
}

fn parse_f64(s: &str, line_no: u64) -> Result<f64> {
    s.parse::<f64>().map_err(|_| Error::at(ErrorKind::BadValueType { expected: "float", found: '?' }, line_no))
}

/// Resolves a single OBJ-style reference (1-based, or negative for
/// relative-to-current-end) to a 0-based index, honoring
/// `index_error_handling`. References beyond `1e19` in magnitude are
/// rejected outright regardless of policy (§4.8 edge case: absurd indices
/// are never silently wrapped).
fn resolve_index(raw: i64, count: i64, opts: &LoadOptions, warnings: &mut Vec<crate::error::Warning>, line_no: u64) -> Result<u32> {
    if raw.unsigned_abs() as f64 > 1e19 {
        return Err(Error::at(ErrorKind::BadIndex { fault: crate::error::IndexFault::OutOfRange, index: raw, len: count as usize }, line_no));
    }
    let resolved = if raw > 0 { raw - 1 } else { count + raw };
    if resolved >= 0 && resolved < count {
        return Ok(resolved as u32);
    }
    match opts.index_error_handling {
        IndexErrorHandling::Abort => Err(Error::at(ErrorKind::BadIndex { fault: crate::error::IndexFault::OutOfRange, index: raw, len: count as usize }, line_no)),
        IndexErrorHandling::Clamp => {
            warnings.push(crate::error::Warning { kind: ErrorKind::BadIndex { fault: crate::error::IndexFault::OutOfRange, index: raw, len: count as usize }, offset: Some(line_no) });
            Ok(resolved.clamp(0, (count - 1).max(0)) as u32)
        }
        IndexErrorHandling::NoIndex => {
            warnings.push(crate::error::Warning { kind: ErrorKind::BadIndex { fault: crate::error::IndexFault::OutOfRange, index: raw, len: count as usize }, offset: Some(line_no) });
            Ok(NO_REF)
        }
    }
}

fn parse_face(rest: &[&str], counts: &Counts, opts: &LoadOptions, warnings: &mut Vec<crate::error::Warning>, line_no: u64) -> Result<Vec<VertexRef>> {
    if rest.len() < 3 {
        return Err(Error::at(ErrorKind::BadArraySize { expected: 3, found: rest.len() }, line_no));
    }
    let mut refs = Vec::with_capacity(rest.len());
    for token in rest {
        let mut fields = token.split('/');
        let pos_raw: i64 = fields.next().unwrap_or("").parse().map_err(|_| Error::at(ErrorKind::BadValueType { expected: "integer", found: '?' }, line_no))?;
        let uv_field = fields.next().unwrap_or("");
        let normal_field = fields.next().unwrap_or("");

        let position = resolve_index(pos_raw, counts.num_positions, opts, warnings, line_no)?;
        let uv = if uv_field.is_empty() {
            NO_REF
        } else {
            resolve_index(uv_field.parse().map_err(|_| Error::at(ErrorKind::BadValueType { expected: "integer", found: '?' }, line_no))?, counts.num_uvs, opts, warnings, line_no)?
        };
        let normal = if normal_field.is_empty() {
            NO_REF
        } else {
            resolve_index(normal_field.parse().map_err(|_| Error::at(ErrorKind::BadValueType { expected: "integer", found: '?' }, line_no))?, counts.num_normals, opts, warnings, line_no)?
        };
        refs.push(VertexRef { position, uv, normal });
    }
    // §4.8 edge case: a negated final polygon-vertex index marks the last
    // vertex of a legacy-style polygon line; OBJ proper has no such
    // convention; ufbx's `.obj` reader tolerates it by simply ignoring the
    // sign, which `resolve_index`'s relative-index handling already does.
    Ok(refs)
}

/// A named MTL material, already resolved to the internal property shape
/// used for FBX materials so `ElementReader` has one material record type.
#[derive(Clone, Debug, Default)]
pub struct MtlMaterial {
    pub name: String,
    pub diffuse: [f64; 3],
    pub ambient: [f64; 3],
    pub specular: [f64; 3],
    pub emissive: [f64; 3],
    pub specular_exponent: f64,
    pub roughness: Option<f64>,
    pub metallic: Option<f64>,
    pub opacity: f64,
    pub ior: f64,
    pub diffuse_map: Option<MtlTexture>,
    pub normal_map: Option<MtlTexture>,
    pub specular_map: Option<MtlTexture>,
    pub bump_map: Option<MtlTexture>,
}

#[derive(Clone, Debug, Default)]
pub struct MtlTexture {
    pub path: String,
    pub offset: [f64; 3],
    pub scale: [f64; 3],
    pub clamp: bool,
    pub blend_u: bool,
    pub blend_v: bool,
    pub bump_multiplier: f64,
    pub imfchan: Option<char>,
}

pub fn parse_mtl(text: &str) -> Result<Vec<MtlMaterial>> {
    let mut materials = Vec::new();
    for raw_line in join_continuations(text) {
        let line = match raw_line.find('#') {
            Some(h) => &raw_line[..h],
            None => &raw_line[..],
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_ascii_whitespace();
        let keyword = match parts.next() {
            Some(k) => k,
            None => continue,
        };
        let rest: Vec<&str> = parts.collect();
        match keyword {
            "newmtl" => materials.push(MtlMaterial { name: rest.join(" "), opacity: 1.0, ior: 1.5, ..Default::default() }),
            "Kd" => set_color(&mut materials, &rest, |m| &mut m.diffuse),
            "Ka" => set_color(&mut materials, &rest, |m| &mut m.ambient),
            "Ks" => set_color(&mut materials, &rest, |m| &mut m.specular),
            "Ke" => set_color(&mut materials, &rest, |m| &mut m.emissive),
            "Ns" => {
                if let (Some(m), Some(v)) = (materials.last_mut(), rest.first().and_then(|s| s.parse::<f64>().ok())) {
                    m.specular_exponent = v;
                    if m.roughness.is_none() {
                        m.roughness = Some(ns_to_roughness(v));
                    }
                }
            }
            "Pr" => {
                if let (Some(m), Some(v)) = (materials.last_mut(), rest.first().and_then(|s| s.parse::<f64>().ok())) {
                    m.roughness = Some(v.clamp(0.0, 1.0));
                }
            }
            "Pm" => {
                if let (Some(m), Some(v)) = (materials.last_mut(), rest.first().and_then(|s| s.parse::<f64>().ok())) {
                    m.metallic = Some(v.clamp(0.0, 1.0));
                }
            }
            "Ni" => {
                if let (Some(m), Some(v)) = (materials.last_mut(), rest.first().and_then(|s| s.parse::<f64>().ok())) {
                    m.ior = v;
                }
            }
            "d" => {
                if let (Some(m), Some(v)) = (materials.last_mut(), rest.first().and_then(|s| s.parse::<f64>().ok())) {
                    m.opacity = v;
                }
            }
            "Tr" => {
                if let (Some(m), Some(v)) = (materials.last_mut(), rest.first().and_then(|s| s.parse::<f64>().ok())) {
                    m.opacity = 1.0 - v;
                }
            }
            "map_Kd" => assign_texture(&mut materials, &rest, |m| &mut m.diffuse_map),
            "map_Ks" => assign_texture(&mut materials, &rest, |m| &mut m.specular_map),
            "bump" | "map_bump" | "map_Bump" => assign_texture(&mut materials, &rest, |m| &mut m.bump_map),
            "norm" | "map_norm" => assign_texture(&mut materials, &rest, |m| &mut m.normal_map),
            _ => {}
        }
    }
    Ok(materials)
}

fn set_color(materials: &mut [MtlMaterial], rest: &[&str], field: impl Fn(&mut MtlMaterial) -> &mut [f64; 3]) {
    if rest.len() < 3 {
        return;
    }
    if let Some(m) = materials.last_mut() {
        if let (Ok(r), Ok(g), Ok(b)) = (rest[0].parse(), rest[1].parse(), rest[2].parse()) {
            *field(m) = [r, g, b];
        }
    }
}

/// Parses a `map_*` directive's suboptions (`-o`, `-s`, `-blendu`, etc.) and
/// the trailing filename.
fn assign_texture(materials: &mut [MtlMaterial], rest: &[&str], field: impl Fn(&mut MtlMaterial) -> &mut Option<MtlTexture>) {
    let Some(m) = materials.last_mut() else { return };
    let mut tex = MtlTexture { scale: [1.0; 3], bump_multiplier: 1.0, ..Default::default() };
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            "-o" => {
                tex.offset = read_vec3_opt(rest, i + 1);
                i += 4;
            }
            "-s" => {
                tex.scale = read_vec3_opt(rest, i + 1);
                i += 4;
            }
            "-clamp" => {
                tex.clamp = rest.get(i + 1) == Some(&"on");
                i += 2;
            }
            "-blendu" => {
                tex.blend_u = rest.get(i + 1) != Some(&"off");
                i += 2;
            }
            "-blendv" => {
                tex.blend_v = rest.get(i + 1) != Some(&"off");
                i += 2;
            }
            "-bm" => {
                tex.bump_multiplier = rest.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(1.0);
                i += 2;
            }
            "-imfchan" => {
                tex.imfchan = rest.get(i + 1).and_then(|s| s.chars().next());
                i += 2;
            }
            "-t" => {
                i += 4;
            }
            other => {
                tex.path = other.to_string();
                i += 1;
            }
        }
    }
    *field(m) = Some(tex);
}

fn read_vec3_opt(rest: &[&str], start: usize) -> [f64; 3] {
    let mut v = [0.0; 3];
    for k in 0..3 {
        if let Some(s) = rest.get(start + k) {
            if let Ok(f) = s.parse::<f64>() {
                v[k] = f;
            }
        }
    }
    v
}

/// Adapts a parsed [`ObjDocument`] onto a [`NodeTree`] so that downstream
/// element/property readers (which only know how to walk a `NodeTree`) can
/// consume OBJ content exactly like an FBX node tree.
pub fn document_to_node_tree<'a>(doc: &ObjDocument, arena: &'a Arena, pool: &mut StringPool<'a>, opts: &LoadOptions, warnings: &mut Vec<crate::error::Warning>) -> Result<NodeTree<'a>> {
    let mut tree = NodeTree::new();

    let positions: Vec<f64> = doc.positions.iter().flatten().copied().collect();
    let uvs: Vec<f64> = doc.uvs.iter().flatten().copied().collect();
    let normals: Vec<f64> = doc.normals.iter().flatten().copied().collect();

    let mesh_name = pool.intern(b"Geometry", false, opts.unicode_error_handling, warnings)?;
    let pos_node = push_f64_array(&mut tree, arena, pool, opts, warnings, "Vertices", positions)?;
    let mut children = vec![pos_node];
    if !uvs.is_empty() {
        children.push(push_f64_array(&mut tree, arena, pool, opts, warnings, "UV", uvs)?);
    }
    if !normals.is_empty() {
        children.push(push_f64_array(&mut tree, arena, pool, opts, warnings, "Normals", normals)?);
    }

    let mut poly_indices = Vec::new();
    for face in &doc.faces {
        for (i, r) in face.refs.iter().enumerate() {
            let last = i + 1 == face.refs.len();
            let idx = r.position as i64;
            poly_indices.push(if last { -(idx + 1) } else { idx });
        }
    }
    let idx_arr = arena.alloc_slice::<i64>(poly_indices.len())?;
    idx_arr.copy_from_slice(&poly_indices);
    let idx_name = pool.intern(b"PolygonVertexIndex", false, opts.unicode_error_handling, warnings)?;
    children.push(tree.push(RawNode { name: idx_name, values: vec![Value::ArrayI64(idx_arr)], children: Vec::new() }));

    let root = tree.push(RawNode { name: mesh_name, values: Vec::new(), children });
    tree.roots.push(root);
    Ok(tree)
}

fn push_f64_array<'a>(
    tree: &mut NodeTree<'a>,
    arena: &'a Arena,
    pool: &mut StringPool<'a>,
    opts: &LoadOptions,
    warnings: &mut Vec<crate::error::Warning>,
    name: &str,
    values: Vec<f64>,
) -> Result<u32> {
    let name_handle = pool.intern(name.as_bytes(), false, opts.unicode_error_handling, warnings)?;
    let arr = arena.alloc_slice::<f64>(values.len())?;
    arr.copy_from_slice(&values);
    Ok(tree.push(RawNode { name: name_handle, values: vec![Value::ArrayF64(arr)], children: Vec::new() }))
}
