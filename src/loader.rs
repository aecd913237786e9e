//! Top-level load orchestration (§5).
//!
//! One entry point that takes anything implementing the source trait,
//! plus a convenience wrapper for the common file-path case. Every step
//! after format sniffing is driven entirely by `LoadOptions`; nothing
//! here touches global or process-wide state, and a cancelled or failed
//! load never returns a partially-built `Scene`.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::byte_source::{ByteSource, IoSource, Reader, SliceSource};
use crate::connections::ConnectionGraph;
use crate::elements::{read_element, read_mesh, OBJECT_CLASS_NAMES};
use crate::error::{Error, ErrorKind, Result};
use crate::finalize::Finalizer;
use crate::node_tree::NodeTree;
use crate::obj;
use crate::options::{FileFormat, LoadOptions};
use crate::properties::read_templates;
use crate::scene::{AnimLayer, AnimValue, Element, ElementType, InheritMode, Node, RotationOrder, Scene, Template};
use crate::string_pool::StringPool;
use crate::{ascii, binary};

/// Sniffs the format from the first bytes of `data`: the binary FBX magic,
/// the ASCII `; FBX ...` comment header many exporters prepend, or else
/// falls back to treating content as OBJ text (§4.6/§4.8 both begin with
/// human-readable ASCII, so the magic check must run first).
fn sniff_format(data: &[u8]) -> FileFormat {
    if data.len() >= 21 && &data[0..21] == binary::MAGIC {
        return FileFormat::Fbx;
    }
    let head = &data[..data.len().min(256)];
    if head.windows(3).any(|w| w == b"FBX") || std::str::from_utf8(head).map(|s| s.contains("FBXHeaderExtension")).unwrap_or(false) {
        return FileFormat::Fbx;
    }
    FileFormat::Obj
}

/// Loads a complete `Scene` from an in-memory byte buffer.
pub fn load_from_slice(data: &[u8], opts: &LoadOptions) -> Result<Scene> {
    let mut source = SliceSource::new(data);
    load_from_source(&mut source, opts)
}

/// Loads a complete `Scene` from any [`ByteSource`], such as an
/// [`IoSource`]-wrapped file handle.
pub fn load_from_source(source: &mut dyn ByteSource, opts: &LoadOptions) -> Result<Scene> {
    let mut reader = Reader::new(source, opts.read_buffer_size, opts.progress_cb.clone());
    let mut buf = Vec::new();
    loop {
        let chunk = reader.peek(64 * 1024)?;
        if chunk.is_empty() {
            break;
        }
        let n = chunk.len();
        buf.extend_from_slice(chunk);
        reader.consume(n)?;
    }
    load_from_slice_checked(&buf, opts)
}

/// Convenience wrapper over a filesystem path.
pub fn load_from_path(path: &std::path::Path, opts: &LoadOptions) -> Result<Scene> {
    let file = std::fs::File::open(path)?;
    let mut source = IoSource::new(std::io::BufReader::new(file));
    load_from_source(&mut source, opts)
}

fn load_from_slice_checked(data: &[u8], opts: &LoadOptions) -> Result<Scene> {
    let format = match opts.file_format {
        FileFormat::Unknown => sniff_format(data),
        other => other,
    };

    let arena = Arena::new(opts.result_allocator.clone());
    let mut pool = StringPool::new(&arena);
    let mut warnings = Vec::new();

    let scene = match format {
        FileFormat::Fbx => {
            if data.len() >= 21 && &data[0..21] == binary::MAGIC {
                let (tree, version) = binary::parse(data, &arena, &mut pool, opts, &mut warnings)
                    .map_err(|e| e.frame("load_from_slice", "parsing binary FBX"))?;
                build_scene_from_fbx_tree(&tree, version, opts, &mut warnings)?
            } else {
                let text = std::str::from_utf8(data).map_err(|_| Error::new(ErrorKind::InvalidUtf8))?;
                let tree = ascii::parse(text.as_bytes(), &arena, &mut pool, opts, &mut warnings)
                    .map_err(|e| e.frame("load_from_slice", "parsing ASCII FBX"))?;
                let version = tree
                    .find_root("FBXHeaderExtension")
                    .and_then(|h| tree.find(h, "FBXVersion"))
                    .and_then(|v| tree.get_val1_i64(v))
                    .unwrap_or(7400) as u32;
                build_scene_from_fbx_tree(&tree, version, opts, &mut warnings)?
            }
        }
        FileFormat::Obj => {
            let text = std::str::from_utf8(data).map_err(|_| Error::new(ErrorKind::InvalidUtf8))?;
            build_scene_from_obj(text, opts, &mut warnings)?
        }
        FileFormat::Mtl => return Err(Error::new(ErrorKind::UnrecognizedFileFormat)),
        FileFormat::Unknown => unreachable!(),
    };

    if opts.strict && !warnings.is_empty() {
        let first = warnings.remove(0);
        return Err(Error::new(first.kind));
    }

    let mut scene = scene;
    scene.metadata.warnings = warnings;
    scene.metadata.is_ascii = matches!(format, FileFormat::Fbx) && !(data.len() >= 21 && &data[0..21] == binary::MAGIC);
    Ok(scene)
}

fn build_scene_from_fbx_tree(tree: &NodeTree, version: u32, opts: &LoadOptions, warnings: &mut Vec<crate::error::Warning>) -> Result<Scene> {
    let objects_node = tree.find_root("Objects");
    let mut elements = Vec::new();
    let mut fbx_id_to_element: HashMap<i64, u32> = HashMap::new();
    let mut geometry_nodes: HashMap<u32, u32> = HashMap::new(); // element_id -> object_node

    let template_props = read_templates(tree, warnings);

    if let Some(objects_node) = objects_node {
        for &child in &tree.node(objects_node).children {
            let class_name = tree.node(child).name.as_str();
            if !OBJECT_CLASS_NAMES.contains(&class_name) {
                continue;
            }
            let element_id = elements.len() as u32;
            let element = read_element(tree, child, version, element_id, 0, &template_props, opts, warnings)
                .map_err(|e| e.frame("build_scene_from_fbx_tree", "reading object"))?;
            fbx_id_to_element.insert(element.fbx_id, element_id);
            if element.element_type == ElementType::Mesh {
                geometry_nodes.insert(element_id, child);
            }
            elements.push(element);
        }
    }

    let mut typed_counters: HashMap<ElementType, u32> = HashMap::new();
    for e in elements.iter_mut() {
        let counter = typed_counters.entry(e.element_type).or_insert(0);
        e.typed_id = *counter;
        *counter += 1;
    }

    let root_fbx_id: i64 = 0;
    let graph = if let Some(conn_node) = tree.find_root("Connections") {
        ConnectionGraph::from_connections_block(tree, conn_node, &fbx_id_to_element, root_fbx_id, opts, warnings)
            .map_err(|e| e.frame("build_scene_from_fbx_tree", "reading connections"))?
    } else {
        ConnectionGraph::from_implicit_links(synthesize_pre7000_links(tree, &fbx_id_to_element, objects_node))
    };
    graph.attach_views(&mut elements);

    let mut nodes: HashMap<u32, Node> = HashMap::new();
    for e in &elements {
        if e.element_type == ElementType::Node || e.element_type == ElementType::Bone || e.element_type == ElementType::Empty {
            nodes.insert(e.element_id, build_node(e));
        }
    }

    let mut meshes = HashMap::new();
    for (&element_id, &object_node) in &geometry_nodes {
        let mesh = read_mesh(tree, object_node, element_id, opts, warnings).map_err(|e| e.frame("build_scene_from_fbx_tree", "reading mesh"))?;
        meshes.insert(element_id, mesh);
    }

    // `Geometry -> Model` connections (geometry is the connection source,
    // the model it's attached to is the destination) attach meshes to nodes.
    for (&node_id, node) in nodes.iter_mut() {
        for src in graph.sources_of(node_id) {
            if meshes.contains_key(&src) {
                node.attributes.push(src);
            }
        }
    }

    let mut anim_curves = HashMap::new();
    let mut anim_values = HashMap::new();
    let mut anim_layers = HashMap::new();
    for e in &elements {
        match e.element_type {
            ElementType::AnimValue => {
                anim_values.insert(e.element_id, AnimValue { element: e.element_id, property_name: e.name.clone(), target_element: 0, curves: [None; 3], default_value: [0.0; 3] });
            }
            ElementType::AnimLayer => {
                let compose_rotation = e.props.find("Weight").is_some();
                anim_layers.insert(e.element_id, AnimLayer { element: e.element_id, compose_rotation, compose_scale: false, weight: 1.0, values: Vec::new() });
            }
            _ => {}
        }
    }
    for &child in objects_node.map(|o| tree.node(o).children.clone()).unwrap_or_default().iter() {
        let node = tree.node(child);
        if node.name.as_str() != "AnimationCurve" {
            continue;
        }
        let fbx_id = node.values.first().and_then(|v| v.as_i64()).unwrap_or(0);
        let Some(&element_id) = fbx_id_to_element.get(&fbx_id) else { continue };
        if let Some(curve) = read_anim_curve(tree, child, element_id) {
            anim_curves.insert(element_id, curve);
        }
    }

    let templates = template_props
        .iter()
        .map(|((class_name, sub_type), props)| Template {
            element_type: crate::elements::classify_for_template(class_name, sub_type),
            sub_type: sub_type.clone(),
            props: props.clone(),
        })
        .collect();

    let finalizer = Finalizer {
        elements,
        meshes,
        nodes,
        anim_curves,
        anim_values,
        anim_layers,
        anim_stacks: Vec::new(),
        templates,
        graph: &graph,
        opts,
        warnings,
    };
    let mut scene = finalizer.finalize()?;
    scene.metadata.version = version;
    if opts.retain_dom {
        scene.dom = Some(tree.to_dom());
    }
    Ok(scene)
}

fn read_anim_curve(tree: &NodeTree, curve_node: u32, element: u32) -> Option<crate::scene::AnimCurve> {
    let key_time = tree.find(curve_node, "KeyTime").and_then(|n| tree.get_val_at(n, 0)).and_then(|v| v.as_i64_array())?;
    let key_value = tree.find(curve_node, "KeyValueFloat").and_then(|n| tree.get_val_at(n, 0)).and_then(|v| v.as_f64_array())?;
    let attr_flags_i64 = tree.find(curve_node, "KeyAttrFlags").and_then(|n| tree.get_val_at(n, 0)).and_then(|v| v.as_i64_array()).unwrap_or_default();
    let attr_flags: Vec<i32> = attr_flags_i64.iter().map(|&v| v as i32).collect();
    let attr_data = tree.find(curve_node, "KeyAttrDataFloat").and_then(|n| tree.get_val_at(n, 0)).and_then(|v| v.as_f64_array()).unwrap_or_default();
    let attr_data_f32: Vec<f32> = attr_data.iter().map(|&v| v as f32).collect();
    let attr_ref_count_i64 = tree.find(curve_node, "KeyAttrRefCount").and_then(|n| tree.get_val_at(n, 0)).and_then(|v| v.as_i64_array()).unwrap_or_else(|| vec![key_time.len() as i64]);
    let attr_ref_count: Vec<i32> = attr_ref_count_i64.iter().map(|&v| v as i32).collect();

    crate::animation::decode_curve(element, &key_time, &key_value, &attr_flags, &attr_data_f32, &attr_ref_count).ok()
}

fn build_node(e: &Element) -> Node {
    let mut node = Node::new(e.element_id);
    if let Some(p) = e.props.find("Lcl Translation") {
        node.translation = p.as_vec3();
    }
    if let Some(p) = e.props.find("Lcl Rotation") {
        node.rotation_euler_deg = p.as_vec3();
    }
    if let Some(p) = e.props.find("Lcl Scaling") {
        node.scale = p.as_vec3();
    }
    if let Some(p) = e.props.find("GeometricTranslation") {
        node.geometric_translation = p.as_vec3();
    }
    if let Some(p) = e.props.find("GeometricRotation") {
        node.geometric_rotation_deg = p.as_vec3();
    }
    if let Some(p) = e.props.find("GeometricScaling") {
        node.geometric_scale = p.as_vec3();
    }
    if let Some(p) = e.props.find("RotationOrder") {
        node.rotation_order = match p.value_int {
            1 => RotationOrder::XZY,
            2 => RotationOrder::YZX,
            3 => RotationOrder::YXZ,
            4 => RotationOrder::ZXY,
            5 => RotationOrder::ZYX,
            6 => RotationOrder::SphericXYZ,
            _ => RotationOrder::XYZ,
        };
    }
    if let Some(p) = e.props.find("InheritType") {
        node.inherit_mode = match p.value_int {
            1 => InheritMode::RSrs,
            2 => InheritMode::Rrs,
            _ => InheritMode::RrSs,
        };
    }
    node
}

/// Pre-7000 files encode parenting and attribute attachment purely through
/// node nesting (a `Model` node's children that are themselves `Model`/
/// `NodeAttribute` nodes) rather than an explicit `Connections` block.
fn synthesize_pre7000_links(tree: &NodeTree, fbx_id_to_element: &HashMap<i64, u32>, objects_node: Option<u32>) -> Vec<(u32, u32, Option<String>)> {
    let mut links = Vec::new();
    let Some(objects_node) = objects_node else { return links };
    for &child in &tree.node(objects_node).children {
        let Some(fbx_id) = tree.get_val_at(child, 0).and_then(|v| v.as_i64()) else { continue };
        let Some(&src) = fbx_id_to_element.get(&fbx_id) else { continue };
        for &grandchild in &tree.node(child).children {
            if let Some(child_fbx_id) = tree.get_val_at(grandchild, 0).and_then(|v| v.as_i64()) {
                if let Some(&dst) = fbx_id_to_element.get(&child_fbx_id) {
                    links.push((dst, src, None));
                }
            }
        }
    }
    links
}

fn build_scene_from_obj(text: &str, opts: &LoadOptions, warnings: &mut Vec<crate::error::Warning>) -> Result<Scene> {
    let doc = obj::parse_obj(text, opts, warnings)?;

    let arena = Arena::new(opts.result_allocator.clone());
    let mut pool = StringPool::new(&arena);

    let mesh_element = Element {
        element_id: 0,
        typed_id: 0,
        fbx_id: 1,
        name: "Mesh".to_string(),
        element_type: ElementType::Mesh,
        sub_type: "Mesh".to_string(),
        props: crate::scene::PropertySet::new(),
        connections_src: Vec::new(),
        connections_dst: Vec::new(),
    };
    let node_element = Element {
        element_id: 1,
        typed_id: 0,
        fbx_id: 2,
        name: "Node".to_string(),
        element_type: ElementType::Node,
        sub_type: "Mesh".to_string(),
        props: crate::scene::PropertySet::new(),
        connections_src: Vec::new(),
        connections_dst: Vec::new(),
    };

    let tree = obj::document_to_node_tree(&doc, &arena, &mut pool, opts, warnings)?;
    let mut mesh = read_mesh(&tree, tree.roots[0], 0, opts, warnings)?;

    if !doc.uvs.is_empty() {
        let mut uv_indices = Vec::new();
        for face in &doc.faces {
            for r in &face.refs {
                uv_indices.push(r.uv);
            }
        }
        mesh.uv_sets = vec![crate::scene::IndexedAttribute { values: doc.uvs.clone(), indices: uv_indices }];
    }
    if !doc.normals.is_empty() {
        let mut normal_indices = Vec::new();
        for face in &doc.faces {
            for r in &face.refs {
                normal_indices.push(r.normal);
            }
        }
        mesh.vertex_normal = crate::scene::IndexedAttribute { values: doc.normals.clone(), indices: normal_indices };
    }
    if !doc.vertex_colors.is_empty() {
        let indices = (0..mesh.num_indices).map(|i| (i as usize % doc.vertex_colors.len()) as u32).collect();
        mesh.color_sets = vec![crate::scene::IndexedAttribute { values: doc.vertex_colors.clone(), indices }];
    }
    mesh.face_material = doc.faces.iter().map(|f| f.material.max(0)).collect();

    let mut node = Node::new(1);
    node.attributes.push(0);

    let mut elements = vec![mesh_element, node_element];
    let mut typed_counters: HashMap<ElementType, u32> = HashMap::new();
    for e in elements.iter_mut() {
        let counter = typed_counters.entry(e.element_type).or_insert(0);
        e.typed_id = *counter;
        *counter += 1;
    }

    let mut nodes = HashMap::new();
    nodes.insert(1, node);
    let mut meshes = HashMap::new();
    meshes.insert(0, mesh);

    let graph = ConnectionGraph::from_implicit_links(vec![(0, 1, None)]);
    graph.attach_views(&mut elements);

    let finalizer = Finalizer {
        elements,
        meshes,
        nodes,
        anim_curves: HashMap::new(),
        anim_values: HashMap::new(),
        anim_layers: HashMap::new(),
        anim_stacks: Vec::new(),
        templates: Vec::new(),
        graph: &graph,
        opts,
        warnings,
    };
    let mut scene = finalizer.finalize()?;
    if opts.retain_dom {
        scene.dom = Some(tree.to_dom());
    }
    Ok(scene)
}
