//! Animation curve decode and evaluation (§4.13).
//!
//! Keyframes arrive as four parallel arrays (`KeyTime`, `KeyValueFloat`,
//! `KeyAttrFlags`, `KeyAttrDataFloat`) plus a run-length array
//! (`KeyAttrRefCount`) that says how many consecutive keys share one
//! attribute record. This module decodes that shape into a flat
//! `Vec<Keyframe>` and evaluates it (and layer composition) against a
//! query time.

use crate::error::{Error, ErrorKind, Result};
use crate::scene::{AnimCurve, AnimLayer, AnimStack, ElementId, Interpolation, Keyframe, Scene};

/// FBX's internal time unit: ticks per second, confirmed against the
/// reference fixture suite (`test_animation.h`).
pub const KTIME_SECOND: i64 = 46_186_158_000;

pub fn ktime_to_seconds(ktime: i64) -> f64 {
    ktime as f64 / KTIME_SECOND as f64
}

pub fn seconds_to_ktime(seconds: f64) -> i64 {
    (seconds * KTIME_SECOND as f64).round() as i64
}

/// Bit layout of a `KeyAttrFlags` word (low bits only; upper bits are
/// weight/velocity flags this crate doesn't need to interpret).
const INTERP_CONST: i32 = 0x02;
const INTERP_LINEAR: i32 = 0x04;
const INTERP_CUBIC: i32 = 0x08;
const TANGENT_NEXT: i32 = 0x100;

fn interpolation_from_flags(flags: i32) -> Interpolation {
    if flags & INTERP_CONST != 0 {
        if flags & TANGENT_NEXT != 0 {
            Interpolation::ConstNext
        } else {
            Interpolation::ConstPrev
        }
    } else if flags & INTERP_LINEAR != 0 {
        Interpolation::Linear
    } else if flags & INTERP_CUBIC != 0 {
        Interpolation::Cubic
    } else {
        Interpolation::Linear
    }
}

/// Decodes the parallel key arrays into an [`AnimCurve`]'s keyframe list,
/// enforcing every size invariant in §8 before touching the data
/// (`BAD_ARRAY_SIZE` on any mismatch, so a short write never silently
/// aliases the wrong attribute record to the wrong key).
pub fn decode_curve(
    element: u32,
    key_time: &[i64],
    key_value: &[f64],
    key_attr_flags: &[i32],
    key_attr_data: &[f32],
    key_attr_ref_count: &[i32],
) -> Result<AnimCurve> {
    if key_time.len() != key_value.len() {
        return Err(Error::new(ErrorKind::BadArraySize { expected: key_time.len(), found: key_value.len() }));
    }
    if key_attr_flags.len() != key_attr_ref_count.len() {
        return Err(Error::new(ErrorKind::BadArraySize { expected: key_attr_flags.len(), found: key_attr_ref_count.len() }));
    }
    if key_attr_data.len() != 4 * key_attr_ref_count.len() {
        return Err(Error::new(ErrorKind::BadArraySize { expected: 4 * key_attr_ref_count.len(), found: key_attr_data.len() }));
    }
    let total_refs: i64 = key_attr_ref_count.iter().map(|&c| c as i64).sum();
    if total_refs != key_time.len() as i64 {
        return Err(Error::new(ErrorKind::BadArraySize { expected: key_time.len(), found: total_refs as usize }));
    }

    let mut keyframes = Vec::with_capacity(key_time.len());
    let mut key_idx = 0usize;
    for (attr_idx, &ref_count) in key_attr_ref_count.iter().enumerate() {
        let flags = key_attr_flags[attr_idx];
        let data = &key_attr_data[attr_idx * 4..attr_idx * 4 + 4];
        let interpolation = interpolation_from_flags(flags);
        for _ in 0..ref_count {
            keyframes.push(Keyframe {
                time_ktime: key_time[key_idx],
                value: key_value[key_idx],
                left_slope: data[0] as f64,
                right_slope: data[2] as f64,
                interpolation,
            });
            key_idx += 1;
        }
    }

    Ok(AnimCurve { element, keyframes })
}

/// Evaluates a curve at `time_ktime`, using cubic Hermite interpolation
/// between cubic-tangent keys, linear interpolation between linear keys,
/// and step behavior for the two constant variants (§4.13).
pub fn evaluate_curve(curve: &AnimCurve, time_ktime: i64) -> f64 {
    let keys = &curve.keyframes;
    if keys.is_empty() {
        return 0.0;
    }
    if time_ktime <= keys[0].time_ktime {
        return keys[0].value;
    }
    if time_ktime >= keys[keys.len() - 1].time_ktime {
        return keys[keys.len() - 1].value;
    }

    let idx = match keys.binary_search_by_key(&time_ktime, |k| k.time_ktime) {
        Ok(i) => return keys[i].value,
        Err(i) => i,
    };
    let left = &keys[idx - 1];
    let right = &keys[idx];

    match left.interpolation {
        Interpolation::ConstPrev => left.value,
        Interpolation::ConstNext => right.value,
        Interpolation::Linear => {
            let t = (time_ktime - left.time_ktime) as f64 / (right.time_ktime - left.time_ktime) as f64;
            left.value + (right.value - left.value) * t
        }
        Interpolation::Cubic => hermite(left, right, time_ktime),
    }
}

fn hermite(left: &Keyframe, right: &Keyframe, time_ktime: i64) -> f64 {
    let span = (right.time_ktime - left.time_ktime) as f64;
    let t = (time_ktime - left.time_ktime) as f64 / span;
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    let m0 = left.right_slope * span;
    let m1 = right.left_slope * span;
    h00 * left.value + h10 * m0 + h01 * right.value + h11 * m1
}

/// Composes a layer's value curves for one property into a single scalar
/// per channel: layers marked `compose_rotation`/`compose_scale` multiply
/// (additively for rotation, multiplicatively for scale) onto the base
/// value from earlier layers; all other layers override it outright (§4.13).
pub fn compose_layers<'a>(layers: impl Iterator<Item = (&'a AnimLayer, f64)>, base: f64) -> f64 {
    let mut value = base;
    for (layer, layer_value) in layers {
        if layer.compose_rotation {
            value += layer_value * layer.weight;
        } else if layer.compose_scale {
            value *= 1.0 + (layer_value - 1.0) * layer.weight;
        } else {
            value = value * (1.0 - layer.weight) + layer_value * layer.weight;
        }
    }
    value
}

/// A caller-supplied runtime value that replaces a curve's evaluated value
/// for one `(element, property)` pair, e.g. scrubbing a light's intensity
/// to a fixed preview value regardless of its keyed animation.
#[derive(Clone, Debug)]
pub struct Override {
    pub element_id: ElementId,
    pub property: String,
    pub value: f64,
}

/// Rejects a set of overrides that names the same `(element_id, property)`
/// pair twice — applying both would be ambiguous, so this fails the whole
/// batch rather than picking one silently.
pub fn validate_overrides(overrides: &[Override]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for o in overrides {
        if !seen.insert((o.element_id, o.property.clone())) {
            return Err(Error::new(ErrorKind::DuplicateOverride { element_id: o.element_id, property: o.property.clone() }));
        }
    }
    Ok(())
}

/// Evaluates the value driving `element_id`'s `property` across every layer
/// of `stack` at `time_ktime`, honoring any override naming the same pair
/// instead of consulting the underlying curve. Returns `None` if no
/// `AnimValue` targets that `(element_id, property)` pair under this stack.
pub fn evaluate_property(scene: &Scene, stack: &AnimStack, element_id: ElementId, property: &str, time_ktime: i64, overrides: &[Override]) -> Option<f64> {
    if let Some(o) = overrides.iter().find(|o| o.element_id == element_id && o.property == property) {
        return Some(o.value);
    }
    for &layer_id in &stack.layers {
        let layer = scene.anim_layers.get(&layer_id)?;
        for &value_id in &layer.values {
            let Some(value) = scene.anim_values.get(&value_id) else { continue };
            if value.target_element != element_id || value.property_name != property {
                continue;
            }
            return Some(match value.curves[0].and_then(|c| scene.anim_curves.get(&c)) {
                Some(curve) => evaluate_curve(curve, time_ktime),
                None => value.default_value[0],
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ktime_round_trips_one_second() {
        assert_eq!(seconds_to_ktime(1.0), KTIME_SECOND);
        assert!((ktime_to_seconds(KTIME_SECOND) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn decode_curve_rejects_mismatched_time_value_lengths() {
        let err = decode_curve(0, &[0, 1], &[0.0], &[], &[], &[]);
        assert!(err.is_err());
    }

    #[test]
    fn decode_curve_builds_flat_keyframes_from_run_lengths() {
        let curve = decode_curve(
            0,
            &[0, 100, 200],
            &[0.0, 1.0, 0.5],
            &[INTERP_LINEAR, INTERP_CONST],
            &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            &[2, 1],
        )
        .unwrap();
        assert_eq!(curve.keyframes.len(), 3);
        assert_eq!(curve.keyframes[2].interpolation, Interpolation::ConstPrev);
    }

    #[test]
    fn evaluate_linear_midpoint() {
        let curve = AnimCurve {
            element: 0,
            keyframes: vec![
                Keyframe { time_ktime: 0, value: 0.0, left_slope: 0.0, right_slope: 0.0, interpolation: Interpolation::Linear },
                Keyframe { time_ktime: 100, value: 10.0, left_slope: 0.0, right_slope: 0.0, interpolation: Interpolation::Linear },
            ],
        };
        assert!((evaluate_curve(&curve, 50) - 5.0).abs() < 1e-9);
    }
}
