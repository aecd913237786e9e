//! Geometry (`Mesh`) reading: polygon index table, per-layer attributes
//! (§4.10).
//!
//! FBX stores a mesh as a flat `PolygonVertexIndex` array (one entry per
//! face-vertex, the *last* vertex of each polygon negated-minus-one as an
//! end-of-polygon marker) plus a set of `LayerElementNormal`/
//! `LayerElementUV`/`LayerElementColor`/`LayerElementMaterial` blocks, each
//! carrying its own `MappingInformationType` (`ByVertex`/`ByPolygonVertex`/
//! `ByPolygon`/`ByEdge`/`AllSame`) and `ReferenceInformationType`
//! (`Direct`/`IndexToDirect`).

use crate::error::{Error, ErrorKind, IndexFault, Result};
use crate::node_tree::{NodeTree, Value};
use crate::options::{IndexErrorHandling, LoadOptions};
use crate::scene::{Face, IndexedAttribute, Mesh, NO_INDEX};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mapping {
    ByVertex,
    ByPolygonVertex,
    ByPolygon,
    ByEdge,
    AllSame,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Reference {
    Direct,
    IndexToDirect,
}

fn parse_mapping(tree: &NodeTree, layer: u32) -> Mapping {
    match tree.find(layer, "MappingInformationType").and_then(|n| tree.get_val1_str(n)) {
        Some("ByVertex") | Some("ByVertice") => Mapping::ByVertex,
        Some("ByPolygon") => Mapping::ByPolygon,
        Some("ByEdge") => Mapping::ByEdge,
        Some("AllSame") => Mapping::AllSame,
        _ => Mapping::ByPolygonVertex,
    }
}

fn parse_reference(tree: &NodeTree, layer: u32) -> Reference {
    match tree.find(layer, "ReferenceInformationType").and_then(|n| tree.get_val1_str(n)) {
        Some("Direct") => Reference::Direct,
        _ => Reference::IndexToDirect,
    }
}

/// Reads `PolygonVertexIndex` into per-face-vertex position indices plus
/// the face table, resolving the end-of-polygon negation and producing
/// `num_triangles` via the cheap fan-triangulation count `n - 2` per face
/// (§4.12/§13 supplement).
fn read_polygon_index(
    tree: &NodeTree,
    geometry: u32,
    num_positions: usize,
    opts: &LoadOptions,
    warnings: &mut Vec<crate::error::Warning>,
) -> Result<(Vec<u32>, Vec<Face>, u32)> {
    let idx_node = tree
        .find(geometry, "PolygonVertexIndex")
        .ok_or_else(|| Error::new(ErrorKind::BadArraySize { expected: 1, found: 0 }).frame("mesh::read_polygon_index", "missing PolygonVertexIndex"))?;
    let raw = tree.get_val_at(idx_node, 0).and_then(Value::as_i64_array).unwrap_or_default();

    let mut indices = Vec::with_capacity(raw.len());
    let mut faces = Vec::new();
    let mut num_triangles = 0u32;
    let mut face_start = 0u32;
    let mut face_len = 0u32;

    for &v in &raw {
        let (is_last, pos) = if v < 0 { (true, -(v + 1)) } else { (false, v) };
        let resolved = resolve_vertex_index(pos, num_positions as i64, opts, warnings)?;
        indices.push(resolved);
        face_len += 1;
        if is_last {
            faces.push(Face { index_begin: face_start, num_indices: face_len });
            if face_len >= 3 {
                num_triangles += face_len - 2;
            }
            face_start += face_len;
            face_len = 0;
        }
    }
    if face_len > 0 {
        // Missing end-of-polygon marker on the final face; tolerant mode
        // closes it anyway rather than discarding a whole face's data.
        faces.push(Face { index_begin: face_start, num_indices: face_len });
        if face_len >= 3 {
            num_triangles += face_len - 2;
        }
        warnings.push(crate::error::Warning { kind: ErrorKind::BadArraySize { expected: 0, found: 0 }, offset: None });
    }

    Ok((indices, faces, num_triangles))
}

fn resolve_vertex_index(idx: i64, len: i64, opts: &LoadOptions, warnings: &mut Vec<crate::error::Warning>) -> Result<u32> {
    if idx >= 0 && idx < len {
        return Ok(idx as u32);
    }
    match opts.index_error_handling {
        IndexErrorHandling::Abort => Err(Error::new(ErrorKind::BadIndex { fault: IndexFault::OutOfRange, index: idx, len: len as usize })),
        IndexErrorHandling::Clamp => {
            warnings.push(crate::error::Warning { kind: ErrorKind::BadIndex { fault: IndexFault::OutOfRange, index: idx, len: len as usize }, offset: None });
            Ok(idx.clamp(0, (len - 1).max(0)) as u32)
        }
        IndexErrorHandling::NoIndex => {
            warnings.push(crate::error::Warning { kind: ErrorKind::BadIndex { fault: IndexFault::OutOfRange, index: idx, len: len as usize }, offset: None });
            Ok(NO_INDEX)
        }
    }
}

/// Reads one `LayerElementXxx` block into an `IndexedAttribute`, expanding
/// `ByVertex`/`ByPolygon`/`AllSame` mappings out to the `ByPolygonVertex`
/// per-face-vertex shape every `IndexedAttribute` uses uniformly, and
/// zero-filling any array the exporter wrote too short (§4.10 edge case).
fn read_layer_values<const N: usize>(
    tree: &NodeTree,
    layer: u32,
    values_name: &str,
    index_name: &str,
    vertex_index: &[u32],
    face_of_vertex: &[u32],
    num_vertices: usize,
    num_polygons: usize,
) -> IndexedAttribute<[f64; N]> {
    let mapping = parse_mapping(tree, layer);
    let reference = parse_reference(tree, layer);

    let flat: Vec<f64> = tree
        .find(layer, values_name)
        .and_then(|n| tree.get_val_at(n, 0))
        .and_then(Value::as_f64_array)
        .unwrap_or_default();
    let mut values: Vec<[f64; N]> = flat
        .chunks(N)
        .map(|c| {
            let mut v = [0.0; N];
            for (i, x) in c.iter().enumerate() {
                v[i] = *x;
            }
            v
        })
        .collect();
    if values.is_empty() {
        values.push([0.0; N]);
    }

    let direct_indices: Vec<i64> = if reference == Reference::IndexToDirect {
        tree.find(layer, index_name).and_then(|n| tree.get_val_at(n, 0)).and_then(Value::as_i64_array).unwrap_or_default()
    } else {
        Vec::new()
    };

    let slot_count = vertex_index.len();
    let mut indices = vec![NO_INDEX; slot_count];

    let resolve = |slot: usize, raw_pos: i64| -> u32 {
        match reference {
            Reference::Direct => {
                if raw_pos >= 0 && (raw_pos as usize) < values.len() {
                    raw_pos as u32
                } else {
                    NO_INDEX
                }
            }
            Reference::IndexToDirect => match direct_indices.get(slot) {
                Some(&i) if i >= 0 && (i as usize) < values.len() => i as u32,
                _ => NO_INDEX,
            },
        }
    };

    match mapping {
        Mapping::AllSame => {
            for i in indices.iter_mut() {
                *i = 0;
            }
        }
        Mapping::ByVertex => {
            for (slot, &vi) in vertex_index.iter().enumerate() {
                indices[slot] = resolve(vi as usize, vi as i64);
            }
        }
        Mapping::ByPolygonVertex => {
            for slot in 0..slot_count {
                indices[slot] = resolve(slot, slot as i64);
            }
        }
        Mapping::ByPolygon => {
            for (slot, &face) in face_of_vertex.iter().enumerate() {
                indices[slot] = resolve(face as usize, face as i64);
            }
        }
        Mapping::ByEdge => {
            // Edge-indexed attributes (crease, edge smoothing) are handled
            // by the edge-specific readers below; a by-edge colour/UV layer
            // has no well-defined per-face-vertex expansion, so it
            // collapses to `AllSame`-style index 0 rather than producing
            // garbage.
            for i in indices.iter_mut() {
                *i = 0;
            }
        }
    }
    let _ = (num_vertices, num_polygons);
    IndexedAttribute { values, indices }
}

fn face_of_vertex_table(faces: &[Face], total_slots: usize) -> Vec<u32> {
    let mut out = vec![0u32; total_slots];
    for (face_idx, face) in faces.iter().enumerate() {
        for slot in face.index_begin..face.index_end() {
            out[slot as usize] = face_idx as u32;
        }
    }
    out
}

/// Reads a complete `Geometry`/`Mesh` node into the scene's [`Mesh`] record.
pub fn read_mesh(tree: &NodeTree, geometry: u32, element: u32, opts: &LoadOptions, warnings: &mut Vec<crate::error::Warning>) -> Result<Mesh> {
    let vertices_node = tree.find(geometry, "Vertices");
    let positions_flat: Vec<f64> = vertices_node.and_then(|n| tree.get_val_at(n, 0)).and_then(Value::as_f64_array).unwrap_or_default();
    if positions_flat.is_empty() && !opts.allow_missing_vertex_position {
        return Err(Error::new(ErrorKind::MissingVertexPosition));
    }
    let positions: Vec<[f64; 3]> = positions_flat
        .chunks(3)
        .map(|c| {
            let mut v = [0.0; 3];
            for (i, x) in c.iter().enumerate() {
                v[i] = *x;
            }
            v
        })
        .collect();

    let (vertex_index, faces, num_triangles) = read_polygon_index(tree, geometry, positions.len(), opts, warnings)?;
    let face_of_vertex = face_of_vertex_table(&faces, vertex_index.len());

    let mut vertex_first_index = vec![NO_INDEX; positions.len().max(1)];
    for (slot, &vi) in vertex_index.iter().enumerate() {
        let entry = vertex_first_index.get_mut(vi as usize);
        if let Some(entry) = entry {
            if *entry == NO_INDEX {
                *entry = slot as u32;
            }
        }
    }

    let vertex_position = IndexedAttribute { values: positions, indices: vertex_index.clone() };

    let mut mesh = Mesh {
        element,
        vertex_position,
        num_indices: vertex_index.len() as u32,
        num_triangles,
        faces: faces.clone(),
        vertex_first_index,
        ..Mesh::default()
    };

    for layer in tree.children_named(geometry, "LayerElementNormal") {
        mesh.vertex_normal = read_layer_values::<3>(tree, layer, "Normals", "NormalsIndex", &vertex_index, &face_of_vertex, mesh.vertex_position.values.len(), faces.len());
        break;
    }
    for layer in tree.children_named(geometry, "LayerElementTangent") {
        mesh.vertex_tangent = read_layer_values::<3>(tree, layer, "Tangents", "TangentsIndex", &vertex_index, &face_of_vertex, mesh.vertex_position.values.len(), faces.len());
        break;
    }
    for layer in tree.children_named(geometry, "LayerElementBinormal") {
        mesh.vertex_binormal = read_layer_values::<3>(tree, layer, "Binormals", "BinormalsIndex", &vertex_index, &face_of_vertex, mesh.vertex_position.values.len(), faces.len());
        break;
    }
    for layer in tree.children_named(geometry, "LayerElementUV") {
        mesh.uv_sets.push(read_layer_values::<2>(tree, layer, "UV", "UVIndex", &vertex_index, &face_of_vertex, mesh.vertex_position.values.len(), faces.len()));
    }
    for layer in tree.children_named(geometry, "LayerElementColor") {
        mesh.color_sets.push(read_layer_values::<4>(tree, layer, "Colors", "ColorIndex", &vertex_index, &face_of_vertex, mesh.vertex_position.values.len(), faces.len()));
    }

    mesh.face_material = vec![0; faces.len()];
    for layer in tree.children_named(geometry, "LayerElementMaterial") {
        let mapping = parse_mapping(tree, layer);
        let reference = parse_reference(tree, layer);
        let raw: Vec<i64> = if reference == Reference::Direct {
            Vec::new()
        } else {
            tree.find(layer, "Materials").and_then(|n| tree.get_val_at(n, 0)).and_then(Value::as_i64_array).unwrap_or_default()
        };
        match mapping {
            Mapping::AllSame => {}
            Mapping::ByPolygon => {
                for (face_idx, slot) in mesh.face_material.iter_mut().enumerate() {
                    *slot = raw.get(face_idx).copied().unwrap_or(0) as i32;
                }
            }
            _ => {}
        }
        break;
    }

    mesh.face_smoothing = vec![true; faces.len()];
    for layer in tree.children_named(geometry, "LayerElementSmoothing") {
        let mapping = parse_mapping(tree, layer);
        let raw: Vec<i64> = tree.find(layer, "Smoothing").and_then(|n| tree.get_val_at(n, 0)).and_then(Value::as_i64_array).unwrap_or_default();
        if mapping == Mapping::ByPolygon {
            for (face_idx, slot) in mesh.face_smoothing.iter_mut().enumerate() {
                *slot = raw.get(face_idx).copied().unwrap_or(1) != 0;
            }
        }
        break;
    }

    Ok(mesh)
}
