//! Scenario 1 (§8): a binary FBX cube with 8 vertices and 6 quad faces,
//! each face's last vertex index negated-minus-one per the
//! end-of-polygon convention.

mod common;

use common::{build_binary_fbx, NodeBuilder};
use fbxscene::LoadOptions;

fn cube_vertices() -> Vec<f64> {
    vec![
        -1.0, -1.0, -1.0, // 0
        1.0, -1.0, -1.0, // 1
        1.0, 1.0, -1.0, // 2
        -1.0, 1.0, -1.0, // 3
        -1.0, -1.0, 1.0, // 4
        1.0, -1.0, 1.0, // 5
        1.0, 1.0, 1.0, // 6
        -1.0, 1.0, 1.0, // 7
    ]
}

fn cube_polygon_vertex_index() -> Vec<i32> {
    // Six quads, last index of each face negated-minus-one.
    vec![
        0, 1, 2, !3, // bottom
        4, 5, 6, !7, // top
        0, 1, 5, !4, // front
        3, 2, 6, !7, // back
        0, 3, 7, !4, // left
        1, 2, 6, !5, // right
    ]
}

fn cube_file() -> Vec<u8> {
    let geometry = NodeBuilder::new("Geometry")
        .prop_i64(1000)
        .prop_string("Cube\u{0}\u{1}Mesh")
        .prop_string("Mesh")
        .child(NodeBuilder::new("Vertices").prop_f64_array(&cube_vertices()))
        .child(NodeBuilder::new("PolygonVertexIndex").prop_i32_array(&cube_polygon_vertex_index()));
    let objects = NodeBuilder::new("Objects").child(geometry);
    build_binary_fbx(7400, vec![objects])
}

#[test]
fn loads_cube_mesh_with_expected_topology() {
    let data = cube_file();
    let opts = LoadOptions::default();
    let scene = fbxscene::load_from_slice(&data, &opts).expect("cube file should load");

    assert_eq!(scene.meshes.len(), 1);
    let mesh = scene.meshes.values().next().unwrap();
    assert_eq!(mesh.vertex_position.values.len(), 8);
    assert_eq!(mesh.faces.len(), 6);
    assert_eq!(mesh.num_indices, 24);
    assert_eq!(mesh.num_triangles, 12);
}
