//! Scenario 3 (§8): OBJ faces mixing which of uv/normal/vertex-color
//! streams are present. This loader folds an entire `.obj` document into
//! one mesh, so the combinations are exercised per-document (uv present
//! or not, normal present or not, vertex colors present or not) rather
//! than per-face-group.

use fbxscene::LoadOptions;

fn load(text: &str) -> fbxscene::Scene {
    fbxscene::load_from_slice(text.as_bytes(), &LoadOptions::default()).expect("obj text should load")
}

#[test]
fn position_only_faces_have_no_uv_or_normal_streams() {
    let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
    let scene = load(text);
    let mesh = scene.meshes.values().next().unwrap();
    assert_eq!(mesh.vertex_position.values.len(), 3);
    assert!(mesh.uv_sets.is_empty());
    assert!(mesh.vertex_normal.values.is_empty());
    assert!(mesh.color_sets.is_empty());
}

#[test]
fn uv_only_faces_populate_uv_set_with_matching_index_count() {
    let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nf 1/1 2/2 3/3\n";
    let scene = load(text);
    let mesh = scene.meshes.values().next().unwrap();
    assert_eq!(mesh.uv_sets.len(), 1);
    assert_eq!(mesh.uv_sets[0].values.len(), 3);
    assert_eq!(mesh.uv_sets[0].indices.len(), 3);
    assert!(mesh.vertex_normal.values.is_empty());
}

#[test]
fn normal_only_faces_populate_normal_stream() {
    let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvn 0 0 1\nvn 0 0 1\nf 1//1 2//2 3//3\n";
    let scene = load(text);
    let mesh = scene.meshes.values().next().unwrap();
    assert!(mesh.uv_sets.is_empty());
    assert_eq!(mesh.vertex_normal.values.len(), 3);
    assert_eq!(mesh.vertex_normal.indices.len(), 3);
}

#[test]
fn uv_and_normal_faces_populate_both_streams() {
    let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvn 0 0 1\nvn 0 0 1\nvn 0 0 1\nf 1/1/1 2/2/2 3/3/3\n";
    let scene = load(text);
    let mesh = scene.meshes.values().next().unwrap();
    assert_eq!(mesh.uv_sets.len(), 1);
    assert_eq!(mesh.vertex_normal.values.len(), 3);
}

#[test]
fn mrgb_comment_populates_a_color_set() {
    let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n#MRGB ff0000ffff00ff00ffff0000ff0000ff\n";
    let scene = load(text);
    let mesh = scene.meshes.values().next().unwrap();
    assert_eq!(mesh.color_sets.len(), 1);
    assert_eq!(mesh.color_sets[0].values.len(), 4);
    assert_eq!(mesh.color_sets[0].indices.len(), mesh.num_indices as usize);
}
