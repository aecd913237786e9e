//! Scenario 4 (§8): one quad face mixing fully-specified, normal-only,
//! position-only and out-of-range vertex references (`1/1/1`, `2//2`,
//! `3`, `4/4`, where the uv index on the last vertex has no matching
//! `vt` line), exercised under each `index_error_handling` policy.

use fbxscene::{IndexErrorHandling, LoadOptions};

const NO_INDEX: u32 = fbxscene::NO_INDEX;

fn quad_text() -> &'static str {
    "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvn 0 0 1\nvn 0 0 1\nvn 0 0 1\nf 1/1/1 2//2 3 4/4\n"
}

#[test]
fn abort_policy_rejects_the_out_of_range_uv_index() {
    let mut opts = LoadOptions::default();
    opts.index_error_handling = IndexErrorHandling::Abort;
    let err = fbxscene::load_from_slice(quad_text().as_bytes(), &opts).unwrap_err();
    assert!(matches!(err.kind, fbxscene::ErrorKind::BadIndex { .. }));
}

#[test]
fn no_index_policy_substitutes_the_sentinel_and_loads() {
    let mut opts = LoadOptions::default();
    opts.index_error_handling = IndexErrorHandling::NoIndex;
    let scene = fbxscene::load_from_slice(quad_text().as_bytes(), &opts).expect("should load under no_index policy");
    let mesh = scene.meshes.values().next().unwrap();
    assert_eq!(mesh.uv_sets[0].indices[3], NO_INDEX);
    assert!(!scene.metadata.warnings.is_empty());
}

#[test]
fn clamp_policy_clamps_into_range_and_loads() {
    let mut opts = LoadOptions::default();
    opts.index_error_handling = IndexErrorHandling::Clamp;
    let scene = fbxscene::load_from_slice(quad_text().as_bytes(), &opts).expect("should load under clamp policy");
    let mesh = scene.meshes.values().next().unwrap();
    let clamped = mesh.uv_sets[0].indices[3];
    assert!(clamped != NO_INDEX && (clamped as usize) < mesh.uv_sets[0].values.len());
}

#[test]
fn normal_and_position_only_vertices_keep_their_own_refs() {
    let mut opts = LoadOptions::default();
    opts.index_error_handling = IndexErrorHandling::NoIndex;
    let scene = fbxscene::load_from_slice(quad_text().as_bytes(), &opts).unwrap();
    let mesh = scene.meshes.values().next().unwrap();
    // vertex 2 ("2//2"): normal present, uv absent.
    assert_eq!(mesh.uv_sets[0].indices[1], NO_INDEX);
    assert_eq!(mesh.vertex_normal.indices[1], 1);
    // vertex 3 ("3"): neither uv nor normal present.
    assert_eq!(mesh.uv_sets[0].indices[2], NO_INDEX);
    assert_eq!(mesh.vertex_normal.indices[2], NO_INDEX);
}
