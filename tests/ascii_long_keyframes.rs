//! Scenario 2 (§8): a curve keyed at frames {-5,000,000 .. +5,000,000} in
//! steps of 250,000, at 30 fps. Expect 41 keys total, `evaluate(frame=0)
//! == 0`, `evaluate(frame=200) == 2.0` within 1e-4.

use fbxscene::{seconds_to_ktime, AnimCurve, Interpolation, Keyframe};

const FPS: f64 = 30.0;

fn frame_to_ktime(frame: i64) -> i64 {
    seconds_to_ktime(frame as f64 / FPS)
}

fn long_curve() -> AnimCurve {
    let mut keyframes = Vec::new();
    let mut frame = -5_000_000i64;
    while frame <= 5_000_000 {
        keyframes.push(Keyframe {
            time_ktime: frame_to_ktime(frame),
            value: frame as f64 / 100.0,
            left_slope: 0.0,
            right_slope: 0.0,
            interpolation: Interpolation::Linear,
        });
        frame += 250_000;
    }
    AnimCurve { element: 0, keyframes }
}

#[test]
fn long_curve_has_expected_key_count() {
    let curve = long_curve();
    assert_eq!(curve.keyframes.len(), 41);
}

#[test]
fn evaluate_at_frame_zero_is_zero() {
    let curve = long_curve();
    let value = fbxscene::evaluate_curve(&curve, frame_to_ktime(0));
    assert!(value.abs() < 1e-4, "expected ~0.0, got {value}");
}

#[test]
fn evaluate_at_frame_200_interpolates_between_keys() {
    let curve = long_curve();
    let value = fbxscene::evaluate_curve(&curve, frame_to_ktime(200));
    assert!((value - 2.0).abs() < 1e-4, "expected ~2.0, got {value}");
}
