//! Object dispatch: turns each top-level `Objects`-block node into a typed
//! [`Element`] (§4.10).
//!
//! FBX packs an object's display name and its internal class into one
//! string, joined by the bytes `\x00\x01` (rendered as `::` by most
//! viewers): `"Cube\x00\x01Model"` for 7000+ files, reversed to
//! `"Model\x00\x01Cube"` in files written before FBX 7000. Both orders are
//! tried so old and new files land in the same `Element` shape.

mod mesh;

pub use mesh::read_mesh;

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Result;
use crate::node_tree::{NodeTree, Value};
use crate::options::LoadOptions;
use crate::properties::{apply_template, read_properties_of};
use crate::scene::{Element, ElementType, PropertySet};

const NAME_SEPARATOR: &str = "\u{0}\u{1}";

/// Splits a packed `"Name\x00\x01Class"` string, trying the 7000+ order
/// first and falling back to the reversed pre-7000 order.
pub fn split_name_class(raw: &str, legacy_order: bool) -> (String, String) {
    if let Some(idx) = raw.find(NAME_SEPARATOR) {
        let (a, b) = (&raw[..idx], &raw[idx + NAME_SEPARATOR.len()..]);
        if legacy_order {
            (b.to_string(), a.to_string())
        } else {
            (a.to_string(), b.to_string())
        }
    } else {
        (raw.to_string(), String::new())
    }
}

/// Public entry point for `Definitions`-block templates, which are keyed by
/// the same `(class, subtype)` pair as an instance but never go through
/// `read_element`'s object-node shape.
pub fn classify_for_template(fbx_class: &str, fbx_subclass: &str) -> ElementType {
    classify(fbx_class, fbx_subclass)
}

fn classify(fbx_class: &str, fbx_subclass: &str) -> ElementType {
    match fbx_class {
        "Model" => match fbx_subclass {
            "Mesh" => ElementType::Node,
            "LimbNode" => ElementType::Bone,
            "Null" => ElementType::Empty,
            "Camera" | "CameraStereo" => ElementType::Node,
            "Light" => ElementType::Node,
            _ => ElementType::Node,
        },
        "NodeAttribute" => match fbx_subclass {
            "Light" => ElementType::Light,
            "Camera" => ElementType::Camera,
            "CameraStereo" => ElementType::StereoCamera,
            "Null" => ElementType::Empty,
            "LimbNode" => ElementType::Bone,
            "Marker" => ElementType::Marker,
            "LodGroup" => ElementType::LodGroup,
            _ => ElementType::Empty,
        },
        "Geometry" => match fbx_subclass {
            "NurbsCurve" => ElementType::NurbsCurve,
            "NurbsSurface" => ElementType::NurbsSurface,
            "NurbsCurveOn Surface" | "NurbsTrim" => ElementType::NurbsTrim,
            "Line" => ElementType::Line,
            _ => ElementType::Mesh,
        },
        "Deformer" => match fbx_subclass {
            "Skin" => ElementType::Skin,
            "Cluster" => ElementType::SkinCluster,
            "BlendShape" => ElementType::Blend,
            "BlendShapeChannel" => ElementType::BlendChannel,
            _ => ElementType::Unknown,
        },
        "Material" => ElementType::Material,
        "LayeredTexture" => ElementType::LayeredTexture,
        "Texture" => ElementType::Texture,
        "Video" => ElementType::Video,
        "Implementation" | "BindingTable" => ElementType::ShaderBinding,
        "Shader" => ElementType::Shader,
        "AnimationStack" => ElementType::AnimStack,
        "AnimationLayer" => ElementType::AnimLayer,
        "AnimationCurveNode" => ElementType::AnimValue,
        "AnimationCurve" => ElementType::AnimCurve,
        "Pose" => ElementType::Pose,
        "CollectionExclusive" | "DisplayLayer" => ElementType::DisplayLayer,
        "SelectionSet" => ElementType::SelectionSet,
        "SelectionNode" => ElementType::SelectionNode,
        "Character" => ElementType::Character,
        "Constraint" => ElementType::Constraint,
        "SceneInfo" => ElementType::SceneInfo,
        "Document" => ElementType::Document,
        "CacheDeformer" => ElementType::CacheDeformer,
        "CacheFile" => ElementType::CacheFile,
        "Blend" => ElementType::Blend,
        "BlendShape" => ElementType::BlendShape,
        "GroupSelection" => ElementType::SelectionSet,
        "ProceduralGeometry" => ElementType::ProceduralGeometry,
        _ => ElementType::Unknown,
    }
}

/// Reads one `Objects`-block child into an [`Element`] record, without yet
/// resolving connections (that's `ConnectionGraph`'s job) or per-type
/// payload (meshes route through [`read_mesh`] separately once the element
/// table exists, since mesh reading consults sibling elements for
/// materials).
pub fn read_element(
    tree: &NodeTree,
    object_node: u32,
    fbx_version: u32,
    element_id: u32,
    typed_id: u32,
    templates: &HashMap<(String, String), Rc<PropertySet>>,
    opts: &LoadOptions,
    warnings: &mut Vec<crate::error::Warning>,
) -> Result<Element> {
    let node = tree.node(object_node);
    let fbx_class = node.name.as_str();
    let fbx_id = node.values.first().and_then(Value::as_i64).unwrap_or(0);
    let packed_name = node.values.get(1).and_then(Value::as_str).unwrap_or("");
    let legacy_order = fbx_version < 7000;
    let (name, sub_type) = split_name_class(packed_name, legacy_order);
    let sub_type = if sub_type.is_empty() {
        node.values.get(2).and_then(Value::as_str).unwrap_or("").to_string()
    } else {
        sub_type
    };

    let element_type = classify(fbx_class, &sub_type);
    let mut props = read_properties_of(tree, object_node, warnings);
    apply_template(&mut props, templates, fbx_class, &sub_type);

    Ok(Element {
        element_id,
        typed_id,
        fbx_id,
        name,
        element_type,
        sub_type,
        props,
        connections_src: Vec::new(),
        connections_dst: Vec::new(),
    })
}

/// The FBX "Class" node names that appear as children of the top-level
/// `Objects` block, i.e. the set `read_element` is ever called against.
pub const OBJECT_CLASS_NAMES: &[&str] = &[
    "Model",
    "NodeAttribute",
    "Geometry",
    "Deformer",
    "Material",
    "Texture",
    "LayeredTexture",
    "Video",
    "Implementation",
    "BindingTable",
    "Shader",
    "AnimationStack",
    "AnimationLayer",
    "AnimationCurveNode",
    "AnimationCurve",
    "Pose",
    "CollectionExclusive",
    "DisplayLayer",
    "SelectionSet",
    "SelectionNode",
    "Character",
    "Constraint",
    "SceneInfo",
    "Document",
    "CacheDeformer",
    "CacheFile",
    "GroupSelection",
    "ProceduralGeometry",
];
