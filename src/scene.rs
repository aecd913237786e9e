//! The scene data model (§3).
//!
//! Every entity here is created during a load and lives for the `Scene`'s
//! lifetime; cross-links are dense indices rather than pointers, exactly as
//! §9's design notes call for ("pointer-heavy, id-keyed cross-references" →
//! "arena + dense indices").

use std::collections::HashMap;

use crate::error::Warning;

/// Sentinel marking "no valid index" in an index table (§3, §GLOSSARY).
pub const NO_INDEX: u32 = 0xFFFF_FFFF;

/// A dense index into `Scene::elements`.
pub type ElementId = u32;

/// The set of element kinds the loader can produce.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ElementType {
    Node,
    Mesh,
    Light,
    Camera,
    Bone,
    Empty,
    StereoCamera,
    LodGroup,
    Skin,
    SkinCluster,
    Blend,
    BlendChannel,
    BlendShape,
    CacheDeformer,
    CacheFile,
    Material,
    Texture,
    LayeredTexture,
    Video,
    Shader,
    ShaderBinding,
    AnimStack,
    AnimLayer,
    AnimValue,
    AnimCurve,
    Pose,
    DisplayLayer,
    SelectionSet,
    SelectionNode,
    Character,
    Constraint,
    Marker,
    NurbsCurve,
    NurbsSurface,
    NurbsTrim,
    Line,
    ProceduralGeometry,
    Metadata,
    SceneInfo,
    Document,
    Unknown,
}

/// An internal, version-independent property value type (§4.9).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PropertyType {
    Boolean,
    Integer,
    Number,
    Vector3,
    Color,
    String,
    DateTime,
    Blob,
    Compound,
}

bitflags_like! {
    /// Flags parsed off a `P:`/`Property:` line.
    pub struct PropertyFlags: u32 {
        const ANIMATABLE = 1 << 0;
        const USER       = 1 << 1;
        const HIDDEN     = 1 << 2;
        const LOCKED     = 1 << 3;
        const MUTED      = 1 << 4;
        const OVERRIDE   = 1 << 5;
    }
}

/// A single named property value (§3).
#[derive(Clone, Debug)]
pub struct Property {
    pub name: String,
    pub ty: PropertyType,
    pub flags: PropertyFlags,
    pub value_int: i64,
    pub value_real: [f64; 4],
    pub value_str: String,
    pub value_blob: Vec<u8>,
}

impl Property {
    pub fn new(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            flags: PropertyFlags::empty(),
            value_int: 0,
            value_real: [0.0; 4],
            value_str: String::new(),
            value_blob: Vec::new(),
        }
    }

    pub fn number(name: impl Into<String>, value: f64) -> Self {
        let mut p = Self::new(name, PropertyType::Number);
        p.value_real[0] = value;
        p
    }

    pub fn vector3(name: impl Into<String>, v: [f64; 3]) -> Self {
        let mut p = Self::new(name, PropertyType::Vector3);
        p.value_real[..3].copy_from_slice(&v);
        p
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut p = Self::new(name, PropertyType::String);
        p.value_str = value.into();
        p
    }

    pub fn as_f64(&self) -> f64 {
        self.value_real[0]
    }

    pub fn as_vec3(&self) -> [f64; 3] {
        [self.value_real[0], self.value_real[1], self.value_real[2]]
    }
}

/// A sorted, duplicate-free set of properties, optionally chained to a
/// template's defaults (§3, §8 invariant: "P.props is sorted strictly by
/// name and contains no duplicates").
#[derive(Clone, Debug, Default)]
pub struct PropertySet {
    props: Vec<Property>,
    pub defaults: Option<std::rc::Rc<PropertySet>>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `prop`, replacing an existing entry of the same name (last
    /// value wins) while keeping the set sorted. Returns `true` if a
    /// duplicate was collapsed (caller should emit `DUPLICATE_OVERRIDE`
    /// style warnings as appropriate to the call site).
    pub fn insert(&mut self, prop: Property) -> bool {
        match self.props.binary_search_by(|p| p.name.as_str().cmp(prop.name.as_str())) {
            Ok(idx) => {
                self.props[idx] = prop;
                true
            }
            Err(idx) => {
                self.props.insert(idx, prop);
                false
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<&Property> {
        if let Ok(idx) = self.props.binary_search_by(|p| p.name.as_str().cmp(name)) {
            return Some(&self.props[idx]);
        }
        self.defaults.as_ref().and_then(|d| d.find(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.props.iter()
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Debug-only check of the §8 sortedness/uniqueness invariant.
    pub fn is_sorted_and_unique(&self) -> bool {
        self.props.windows(2).all(|w| w[0].name < w[1].name)
    }
}

/// Defaults inherited by every element of a given `(type, sub_type)` (§3).
#[derive(Clone, Debug)]
pub struct Template {
    pub element_type: ElementType,
    pub sub_type: String,
    pub props: std::rc::Rc<PropertySet>,
}

/// Base record shared by every addressable object in the scene (§3).
#[derive(Clone, Debug)]
pub struct Element {
    pub element_id: ElementId,
    pub typed_id: u32,
    pub fbx_id: i64,
    pub name: String,
    pub element_type: ElementType,
    pub sub_type: String,
    pub props: PropertySet,
    pub connections_src: Vec<u32>,
    pub connections_dst: Vec<u32>,
}

/// A node's rotation order, controlling how Euler angles compose into a
/// quaternion.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RotationOrder {
    XYZ,
    XZY,
    YZX,
    YXZ,
    ZXY,
    ZYX,
    SphericXYZ,
}

impl Default for RotationOrder {
    fn default() -> Self {
        RotationOrder::XYZ
    }
}

/// How a node's transform composes with its parent's.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InheritMode {
    RrSs,
    RSrs,
    Rrs,
}

impl Default for InheritMode {
    fn default() -> Self {
        InheritMode::RrSs
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Quat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Builds a quaternion from Euler angles (radians) applied in the given
    /// rotation order.
    pub fn from_euler(euler_deg: [f64; 3], order: RotationOrder) -> Quat {
        let rad: Vec<f64> = euler_deg.iter().map(|d| d.to_radians()).collect();
        let (sx, cx) = (rad[0] / 2.0).sin_cos();
        let (sy, cy) = (rad[1] / 2.0).sin_cos();
        let (sz, cz) = (rad[2] / 2.0).sin_cos();
        let qx = Quat { x: sx, y: 0.0, z: 0.0, w: cx };
        let qy = Quat { x: 0.0, y: sy, z: 0.0, w: cy };
        let qz = Quat { x: 0.0, y: 0.0, z: sz, w: cz };
        match order {
            RotationOrder::XYZ => qz.mul(&qy).mul(&qx),
            RotationOrder::XZY => qy.mul(&qz).mul(&qx),
            RotationOrder::YZX => qx.mul(&qz).mul(&qy),
            RotationOrder::YXZ => qz.mul(&qx).mul(&qy),
            RotationOrder::ZXY => qy.mul(&qx).mul(&qz),
            RotationOrder::ZYX => qx.mul(&qy).mul(&qz),
            RotationOrder::SphericXYZ => qz.mul(&qy).mul(&qx),
        }
    }

    fn mul(&self, rhs: &Quat) -> Quat {
        Quat {
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        }
    }

    /// Rotates a vector by this quaternion.
    pub fn rotate(&self, v: [f64; 3]) -> [f64; 3] {
        let qv = [self.x, self.y, self.z];
        let t = [
            2.0 * (qv[1] * v[2] - qv[2] * v[1]),
            2.0 * (qv[2] * v[0] - qv[0] * v[2]),
            2.0 * (qv[0] * v[1] - qv[1] * v[0]),
        ];
        [
            v[0] + self.w * t[0] + (qv[1] * t[2] - qv[2] * t[1]),
            v[1] + self.w * t[1] + (qv[2] * t[0] - qv[0] * t[2]),
            v[2] + self.w * t[2] + (qv[0] * t[1] - qv[1] * t[0]),
        ]
    }
}

/// An element + parent/children + local transform (§3).
#[derive(Clone, Debug)]
pub struct Node {
    pub element: ElementId,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementId>,
    pub translation: [f64; 3],
    pub rotation_euler_deg: [f64; 3],
    pub rotation: Quat,
    pub rotation_order: RotationOrder,
    pub scale: [f64; 3],
    pub inherit_mode: InheritMode,
    pub attributes: Vec<ElementId>,
    pub materials: Vec<ElementId>,
    /// Geometric transform applied only to attached geometry, never
    /// inherited by children (`GeometricTranslation/Rotation/Scaling`).
    pub geometric_translation: [f64; 3],
    pub geometric_rotation_deg: [f64; 3],
    pub geometric_scale: [f64; 3],
}

impl Node {
    pub fn new(element: ElementId) -> Self {
        Self {
            element,
            parent: None,
            children: Vec::new(),
            translation: [0.0; 3],
            rotation_euler_deg: [0.0; 3],
            rotation: Quat::IDENTITY,
            rotation_order: RotationOrder::default(),
            scale: [1.0; 3],
            inherit_mode: InheritMode::default(),
            attributes: Vec::new(),
            materials: Vec::new(),
            geometric_translation: [0.0; 3],
            geometric_rotation_deg: [0.0; 3],
            geometric_scale: [1.0; 3],
        }
    }

    pub fn has_identity_geometric_transform(&self) -> bool {
        self.geometric_translation == [0.0; 3]
            && self.geometric_rotation_deg == [0.0; 3]
            && self.geometric_scale == [1.0; 3]
    }
}

/// A boundary between faces in a mesh's flat index arrays.
#[derive(Clone, Copy, Debug, Default)]
pub struct Face {
    pub index_begin: u32,
    pub num_indices: u32,
}

impl Face {
    pub fn index_end(&self) -> u32 {
        self.index_begin + self.num_indices
    }
}

/// A per-index attribute table: `indices[i]` is either `< values.len()` or
/// `NO_INDEX` (§3, §8).
#[derive(Clone, Debug, Default)]
pub struct IndexedAttribute<T> {
    pub values: Vec<T>,
    pub indices: Vec<u32>,
}

impl<T> IndexedAttribute<T> {
    pub fn get(&self, index_slot: usize) -> Option<&T> {
        let idx = *self.indices.get(index_slot)?;
        if idx == NO_INDEX {
            None
        } else {
            self.values.get(idx as usize)
        }
    }
}

/// A single named material-part index range produced during finalization.
#[derive(Clone, Debug)]
pub struct MeshPart {
    pub material_index: i32,
    pub face_indices: Vec<u32>,
    pub num_triangles: u32,
}

/// Vertex positions and per-indexed attributes (§3).
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub element: ElementId,
    pub vertex_position: IndexedAttribute<[f64; 3]>,
    pub vertex_normal: IndexedAttribute<[f64; 3]>,
    pub vertex_tangent: IndexedAttribute<[f64; 3]>,
    pub vertex_binormal: IndexedAttribute<[f64; 3]>,
    pub uv_sets: Vec<IndexedAttribute<[f64; 2]>>,
    pub color_sets: Vec<IndexedAttribute<[f64; 4]>>,
    pub faces: Vec<Face>,
    pub face_material: Vec<i32>,
    pub face_smoothing: Vec<bool>,
    pub face_group: Vec<i32>,
    pub edge_crease: Vec<f64>,
    pub edge_smoothing: Vec<bool>,
    pub num_indices: u32,
    pub num_triangles: u32,
    pub vertex_first_index: Vec<u32>,
    pub materials: Vec<ElementId>,
    pub material_parts: Vec<MeshPart>,
    pub skin_deformers: Vec<ElementId>,
    pub blend_deformers: Vec<ElementId>,
}

/// Polarity of animation-curve tangents/continuity, read off the legacy key
/// attribute flag word (§4.13).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Interpolation {
    Cubic,
    Linear,
    ConstPrev,
    ConstNext,
}

#[derive(Clone, Copy, Debug)]
pub struct Keyframe {
    pub time_ktime: i64,
    pub value: f64,
    pub left_slope: f64,
    pub right_slope: f64,
    pub interpolation: Interpolation,
}

/// An ordered list of keyframes (§3).
#[derive(Clone, Debug, Default)]
pub struct AnimCurve {
    pub element: ElementId,
    pub keyframes: Vec<Keyframe>,
}

/// Up to three curves (x/y/z) plus a default constant value (§3).
#[derive(Clone, Debug, Default)]
pub struct AnimValue {
    pub element: ElementId,
    pub property_name: String,
    pub target_element: ElementId,
    pub curves: [Option<ElementId>; 3],
    pub default_value: [f64; 3],
}

#[derive(Clone, Debug, Default)]
pub struct AnimLayer {
    pub element: ElementId,
    pub compose_rotation: bool,
    pub compose_scale: bool,
    pub weight: f64,
    /// Sorted by `prop_name` (§5 ordering guarantee).
    pub values: Vec<ElementId>,
}

#[derive(Clone, Debug, Default)]
pub struct AnimStack {
    pub element: ElementId,
    pub layers: Vec<ElementId>,
    pub time_begin_ktime: i64,
    pub time_end_ktime: i64,
}

/// A directed, optionally property-tagged edge between two elements (§3).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Connection {
    pub src: ElementId,
    pub dst: ElementId,
    pub src_prop: Option<String>,
    pub dst_prop: Option<String>,
}

/// An owned copy of a [`crate::node_tree::Value`], detached from the arena
/// and string pool so it can outlive the load that produced it.
#[derive(Clone, Debug)]
pub enum DomValue {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Blob(Vec<u8>),
    ArrayI32(Vec<i32>),
    ArrayI64(Vec<i64>),
    ArrayF32(Vec<f32>),
    ArrayF64(Vec<f64>),
    ArrayBool(Vec<bool>),
}

/// An optional retained parse tree node, kept only when `retain_dom` is set.
#[derive(Clone, Debug)]
pub struct DomNode {
    pub name: String,
    pub values: Vec<DomValue>,
    pub children: Vec<DomNode>,
}

#[derive(Clone, Debug, Default)]
pub struct Metadata {
    pub creator: String,
    pub version: u32,
    pub is_ascii: bool,
    pub ktime_second: i64,
    pub warnings: Vec<Warning>,
}

impl Metadata {
    pub const KTIME_SECOND: i64 = 46_186_158_000;
}

/// The root container owning every entity produced by a load (§3).
pub struct Scene {
    pub elements: Vec<Element>,
    pub nodes: HashMap<ElementId, Node>,
    pub meshes: HashMap<ElementId, Mesh>,
    pub anim_curves: HashMap<ElementId, AnimCurve>,
    pub anim_values: HashMap<ElementId, AnimValue>,
    pub anim_layers: HashMap<ElementId, AnimLayer>,
    pub anim_stacks: Vec<AnimStack>,
    pub connections: Vec<Connection>,
    pub connections_by_src: Vec<u32>,
    pub connections_by_dst: Vec<u32>,
    pub templates: Vec<Template>,
    pub typed_ids: HashMap<ElementType, Vec<ElementId>>,
    pub root_node: Option<ElementId>,
    pub name_table: Vec<(String, ElementId)>,
    pub dom: Option<Vec<DomNode>>,
    pub metadata: Metadata,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            nodes: HashMap::new(),
            meshes: HashMap::new(),
            anim_curves: HashMap::new(),
            anim_values: HashMap::new(),
            anim_layers: HashMap::new(),
            anim_stacks: Vec::new(),
            connections: Vec::new(),
            connections_by_src: Vec::new(),
            connections_by_dst: Vec::new(),
            templates: Vec::new(),
            typed_ids: HashMap::new(),
            root_node: None,
            name_table: Vec::new(),
            dom: None,
            metadata: Metadata::default(),
        }
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id as usize]
    }

    pub fn elements_of_type(&self, ty: ElementType) -> &[ElementId] {
        self.typed_ids.get(&ty).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Binary search over the sorted `name_table` (finalizer phase 9).
    pub fn find_by_name(&self, name: &str) -> Option<ElementId> {
        self.name_table
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|idx| self.name_table[idx].1)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// A tiny `bitflags`-shaped macro so `PropertyFlags` behaves like a real
/// bitflags type without pulling in the `bitflags` crate for a single user.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $repr:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
        pub struct $name($repr);

        impl $name {
            $(pub const $flag: $name = $name($value);)*

            pub const fn empty() -> Self {
                $name(0)
            }

            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn insert(&mut self, other: $name) {
                self.0 |= other.0;
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
    };
}
use bitflags_like;
