//! Scenarios 5 and 6 (§8): evaluating an animated property through a
//! runtime override, and rejecting a batch of overrides that names the
//! same element/property pair twice.

use fbxscene::{AnimCurve, AnimLayer, AnimStack, AnimValue, Interpolation, Keyframe, Override, Scene};

const ELEMENT_LIGHT: u32 = 10;

fn scene_with_intensity_curve() -> (Scene, AnimStack) {
    let mut scene = Scene::new();

    let curve = AnimCurve {
        element: 30,
        keyframes: vec![
            Keyframe { time_ktime: 0, value: 1.0, left_slope: 0.0, right_slope: 0.0, interpolation: Interpolation::Linear },
            Keyframe { time_ktime: 1_000, value: 5.0, left_slope: 0.0, right_slope: 0.0, interpolation: Interpolation::Linear },
        ],
    };
    scene.anim_curves.insert(30, curve);

    let value = AnimValue {
        element: 20,
        property_name: "Intensity".to_string(),
        target_element: ELEMENT_LIGHT,
        curves: [Some(30), None, None],
        default_value: [0.0; 3],
    };
    scene.anim_values.insert(20, value);

    let layer = AnimLayer { element: 2, compose_rotation: false, compose_scale: false, weight: 1.0, values: vec![20] };
    scene.anim_layers.insert(2, layer);

    let stack = AnimStack { element: 1, layers: vec![2], time_begin_ktime: 0, time_end_ktime: 1_000 };
    (scene, stack)
}

#[test]
fn evaluate_property_reads_underlying_curve_without_overrides() {
    let (scene, stack) = scene_with_intensity_curve();
    let value = fbxscene::evaluate_property(&scene, &stack, ELEMENT_LIGHT, "Intensity", 500, &[]);
    assert!((value.unwrap() - 3.0).abs() < 1e-9);
}

#[test]
fn evaluate_property_prefers_override_over_curve() {
    let (scene, stack) = scene_with_intensity_curve();
    let overrides = vec![Override { element_id: ELEMENT_LIGHT, property: "Intensity".to_string(), value: 42.0 }];
    let value = fbxscene::evaluate_property(&scene, &stack, ELEMENT_LIGHT, "Intensity", 500, &overrides);
    assert_eq!(value, Some(42.0));
}

#[test]
fn evaluate_property_returns_none_for_unrelated_property() {
    let (scene, stack) = scene_with_intensity_curve();
    let value = fbxscene::evaluate_property(&scene, &stack, ELEMENT_LIGHT, "Color", 500, &[]);
    assert!(value.is_none());
}

#[test]
fn duplicate_override_pair_is_rejected() {
    let overrides = vec![
        Override { element_id: ELEMENT_LIGHT, property: "Intensity".to_string(), value: 1.0 },
        Override { element_id: ELEMENT_LIGHT, property: "Intensity".to_string(), value: 2.0 },
    ];
    let err = fbxscene::validate_overrides(&overrides).unwrap_err();
    assert!(matches!(err.kind, fbxscene::ErrorKind::DuplicateOverride { .. }));
}

#[test]
fn distinct_override_pairs_are_accepted() {
    let overrides = vec![
        Override { element_id: ELEMENT_LIGHT, property: "Intensity".to_string(), value: 1.0 },
        Override { element_id: ELEMENT_LIGHT, property: "Color".to_string(), value: 2.0 },
    ];
    assert!(fbxscene::validate_overrides(&overrides).is_ok());
}
