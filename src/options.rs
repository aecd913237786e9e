//! The load-option surface (§6).
//!
//! A small `Default`-able struct with explicit enums for every tri-state
//! behavior, rather than a pile of booleans with implicit interactions.

use std::sync::Arc;

/// How the caller's file was produced, or `Unknown` to let the loader sniff
/// it from the magic bytes / extension.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum FileFormat {
    #[default]
    Unknown,
    Fbx,
    Obj,
    Mtl,
}

/// Policy for indices that fall outside their target table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum IndexErrorHandling {
    #[default]
    Clamp,
    NoIndex,
    Abort,
}

/// Policy for bytes that fail UTF-8 validation during string interning.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum UnicodeErrorHandling {
    #[default]
    Replace,
    Underscore,
    Raw,
    Abort,
}

/// Policy for a mesh's per-node geometric transform (translation/rotation/
/// scale applied to geometry but not inherited by children).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum GeometryTransformHandling {
    #[default]
    Preserve,
    HelperNodes,
    ModifyGeometry,
}

/// A user-supplied allocator hook set, mirroring ufbx's `ufbx_allocator`.
/// Left `None` to use the host global allocator with no extra caps besides
/// the ones below.
#[derive(Clone)]
pub struct AllocatorOptions {
    /// Maximum number of live allocations before `ALLOCATION_LIMIT_EXCEEDED`.
    pub allocation_limit: Option<usize>,
    /// Maximum total bytes live before `MEMORY_LIMIT_EXCEEDED`.
    pub memory_limit: Option<usize>,
    /// Allocations at or above this size bypass the arena and are tracked
    /// individually so a single huge array doesn't blow the bump chunk size.
    pub huge_threshold: usize,
}

impl Default for AllocatorOptions {
    fn default() -> Self {
        Self {
            allocation_limit: None,
            memory_limit: None,
            huge_threshold: 1 << 20, // 1 MiB
        }
    }
}

impl std::fmt::Debug for AllocatorOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocatorOptions")
            .field("allocation_limit", &self.allocation_limit)
            .field("memory_limit", &self.memory_limit)
            .field("huge_threshold", &self.huge_threshold)
            .finish()
    }
}

/// What the progress callback should do next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressControl {
    Continue,
    Cancel,
}

/// A caller-supplied progress/cancellation hook, invoked roughly every
/// `interval_hint_bytes` bytes consumed from the `ByteSource`.
#[derive(Clone)]
pub struct ProgressCallback {
    pub callback: Arc<dyn Fn(u64) -> ProgressControl + Send + Sync>,
    pub interval_hint_bytes: u64,
}

impl std::fmt::Debug for ProgressCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressCallback")
            .field("interval_hint_bytes", &self.interval_hint_bytes)
            .finish()
    }
}

/// Injection seam for parallelizing large-array decoding. The loader never
/// spawns threads itself; it only ever calls `scatter_gather` if the caller
/// supplied one. See §5: the loader state machine itself stays serial.
pub trait ThreadPool: Send + Sync {
    /// Runs `work` once per item in `0..count`, writing results wherever the
    /// closure chooses (each task must touch a distinct output range).
    fn scatter_gather(&self, count: usize, work: &(dyn Fn(usize) + Send + Sync));
}

/// The full configuration surface for a single load.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub file_format: FileFormat,

    pub ignore_geometry: bool,
    pub ignore_animation: bool,
    pub ignore_embedded: bool,
    pub load_external_files: bool,
    pub ignore_missing_external_files: bool,

    pub allow_missing_vertex_position: bool,
    pub allow_nodes_out_of_root: bool,
    pub connect_broken_elements: bool,
    pub generate_missing_normals: bool,

    pub strict: bool,
    pub disable_quirks: bool,

    pub index_error_handling: IndexErrorHandling,
    pub unicode_error_handling: UnicodeErrorHandling,
    pub geometry_transform_handling: GeometryTransformHandling,

    pub temp_allocator: AllocatorOptions,
    pub result_allocator: AllocatorOptions,

    pub progress_cb: Option<ProgressCallback>,
    pub read_buffer_size: usize,
    pub retain_dom: bool,

    pub thread_pool: Option<Arc<dyn ThreadPool>>,

    /// Bound on parser recursion (node nesting / ASCII scope nesting).
    /// Not part of the original enumerated surface but load-bearing for
    /// §5's stack discipline guarantee; exposed so fuzz harnesses can
    /// tighten it.
    pub max_node_depth: u32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            file_format: FileFormat::Unknown,
            ignore_geometry: false,
            ignore_animation: false,
            ignore_embedded: false,
            load_external_files: false,
            ignore_missing_external_files: false,
            allow_missing_vertex_position: false,
            allow_nodes_out_of_root: false,
            connect_broken_elements: false,
            generate_missing_normals: false,
            strict: false,
            disable_quirks: false,
            index_error_handling: IndexErrorHandling::default(),
            unicode_error_handling: UnicodeErrorHandling::default(),
            geometry_transform_handling: GeometryTransformHandling::default(),
            temp_allocator: AllocatorOptions::default(),
            result_allocator: AllocatorOptions::default(),
            progress_cb: None,
            read_buffer_size: 64 * 1024,
            retain_dom: false,
            thread_pool: None,
            max_node_depth: 32,
        }
    }
}
