//! Boundary behavior (§8): truncated files never panic, node nesting past
//! `max_node_depth` is rejected instead of overflowing the stack, and
//! reading through a one-byte-at-a-time source produces the same scene
//! as reading the whole buffer at once.

mod common;

use common::{build_binary_fbx, NodeBuilder};
use fbxscene::{ErrorKind, IoSource, LoadOptions};

fn cube_file() -> Vec<u8> {
    let geometry = NodeBuilder::new("Geometry")
        .prop_i64(1000)
        .prop_string("Cube\u{0}\u{1}Mesh")
        .prop_string("Mesh")
        .child(NodeBuilder::new("Vertices").prop_f64_array(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]))
        .child(NodeBuilder::new("PolygonVertexIndex").prop_i32_array(&[0, 1, !2]));
    let objects = NodeBuilder::new("Objects").child(geometry);
    build_binary_fbx(7400, vec![objects])
}

#[test]
fn truncated_at_every_prefix_never_panics() {
    let data = cube_file();
    for len in 0..data.len() {
        let _ = fbxscene::load_from_slice(&data[..len], &LoadOptions::default());
    }
}

#[test]
fn truncated_mid_node_reports_truncated_file() {
    let data = cube_file();
    // Cut partway through the `Geometry` node's property list, well past
    // the header but before the children/trailing null record.
    let cut = 27 + 20;
    let err = fbxscene::load_from_slice(&data[..cut], &LoadOptions::default()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TruncatedFile | ErrorKind::UnrecognizedFileFormat));
}

#[test]
fn overdeep_nesting_is_rejected_not_stack_overflowed() {
    let mut chain = NodeBuilder::new("A").prop_i64(0);
    for _ in 0..40 {
        chain = NodeBuilder::new("A").prop_i64(0).child(chain);
    }
    let data = build_binary_fbx(7400, vec![chain]);
    let err = fbxscene::load_from_slice(&data, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::BadNodeNesting { .. }));
}

#[test]
fn single_byte_reads_match_whole_slice_load() {
    let data = cube_file();
    let whole = fbxscene::load_from_slice(&data, &LoadOptions::default()).unwrap();

    let mut opts = LoadOptions::default();
    opts.read_buffer_size = 1;
    let mut source = IoSource::new(std::io::Cursor::new(data));
    let byte_by_byte = fbxscene::load_from_source(&mut source, &opts).unwrap();

    assert_eq!(whole.meshes.len(), byte_by_byte.meshes.len());
    let a = whole.meshes.values().next().unwrap();
    let b = byte_by_byte.meshes.values().next().unwrap();
    assert_eq!(a.vertex_position.values.len(), b.vertex_position.values.len());
    assert_eq!(a.faces.len(), b.faces.len());
}
