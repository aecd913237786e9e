//! Loader for FBX (binary and ASCII, versions 5000-7700) and Wavefront
//! OBJ/MTL scene files into one format-agnostic [`Scene`] graph.
//!
//! ```no_run
//! let opts = fbxscene::LoadOptions::default();
//! let scene = fbxscene::load_from_path("model.fbx".as_ref(), &opts)?;
//! for (_, node) in &scene.nodes {
//!     let _ = node.translation;
//! }
//! # Ok::<(), fbxscene::Error>(())
//! ```

mod animation;
mod arena;
mod ascii;
mod binary;
mod byte_source;
mod connections;
mod elements;
mod error;
mod finalize;
mod inflate;
mod loader;
mod node_tree;
mod obj;
mod options;
mod properties;
mod scene;
mod string_pool;

pub use animation::{evaluate_curve, evaluate_property, ktime_to_seconds, seconds_to_ktime, validate_overrides, Override};
pub use byte_source::{ByteSource, IoSource, SliceSource};
pub use error::{Error, ErrorKind, ErrorStack, Frame, IndexFault, Result, Warning};
pub use loader::{load_from_path, load_from_slice, load_from_source};
pub use options::{
    AllocatorOptions, FileFormat, GeometryTransformHandling, IndexErrorHandling, LoadOptions, ProgressCallback, ProgressControl,
    ThreadPool, UnicodeErrorHandling,
};
pub use scene::{
    AnimCurve, AnimLayer, AnimStack, AnimValue, Connection, DomNode, DomValue, Element, ElementId, ElementType, Face, IndexedAttribute,
    InheritMode, Interpolation, Keyframe, Mesh, MeshPart, Metadata, Node, Property, PropertyFlags, PropertySet, PropertyType,
    Quat, RotationOrder, Scene, Template, NO_INDEX,
};
