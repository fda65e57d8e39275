//! Shape sensitivity: every perturbation must visibly change the body.
//!
//! A generator that silently drops an override exports the neutral body
//! again, and every check on that copy passes for the wrong reason. Each
//! perturbed body's geometry signature is compared with its preset's
//! neutral one; the scenario fails unless some metric moved by at least
//! the configured delta, in that metric's own unit.

use fit_types::{Threshold, ValidationResult};
use fit_validators::checks;
use golden_signature::Signature;

/// Default smallest change that counts as a shape response.
pub const DEFAULT_MIN_SHAPE_DELTA: f64 = 0.05;

/// The metric that moved most, and by how much. Metrics present on only
/// one side are ignored; a NaN delta outranks every number.
pub fn largest_delta(neutral: &Signature, perturbed: &Signature) -> Option<(String, f64)> {
    neutral
        .iter()
        .filter_map(|(name, a)| perturbed.get(name).map(|b| (name, (a - b).abs())))
        .fold(None, |best: Option<(&String, f64)>, (name, delta)| match best {
            Some((_, d)) if d.is_nan() || d >= delta => best,
            _ => Some((name, delta)),
        })
        .map(|(name, delta)| (name.clone(), delta))
}

/// Judge one perturbed body against its preset's neutral body.
pub fn judge(neutral: Option<&Signature>, perturbed: &Signature, min_delta: f64) -> ValidationResult {
    let Some(neutral) = neutral else {
        return ValidationResult::skip(checks::SHAPE_SENSITIVITY, "neutral geometry unavailable for comparison");
    };
    let Some((metric, delta)) = largest_delta(neutral, perturbed) else {
        return ValidationResult::fail(checks::SHAPE_SENSITIVITY, "no geometry metric in common with neutral");
    };
    let mut result = ValidationResult::judged(
        checks::SHAPE_SENSITIVITY,
        "max_shape_delta",
        delta,
        Threshold::at_least("max_shape_delta", min_delta),
    );
    if result.passed() {
        result.message = format!("{metric} moved by {delta:.4} (minimum {min_delta})");
    } else if delta.is_nan() {
        result.message = format!("{metric} is not finite");
    } else {
        result.message = format!("no metric moved by {min_delta} or more; largest was {metric} at {delta:.6}");
    }
    for (name, value) in perturbed {
        if let Some(base) = neutral.get(name) {
            result = result.with_measured(&format!("delta_{name}"), value - base);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use fit_types::CheckStatus;

    fn signature(pairs: &[(&str, f64)]) -> Signature {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn largest_change_wins() {
        let neutral = signature(&[("extent_z_mm", 40.0), ("volume_mm3", 1000.0)]);
        let perturbed = signature(&[("extent_z_mm", 40.0), ("volume_mm3", 1012.5), ("only_here", 3.0)]);
        assert_eq!(largest_delta(&neutral, &perturbed), Some(("volume_mm3".to_string(), 12.5)));
    }

    #[test]
    fn identical_body_fails() {
        let neutral = signature(&[("extent_z_mm", 40.0), ("volume_mm3", 1000.0)]);
        let r = judge(Some(&neutral), &neutral.clone(), 0.05);
        assert!(r.is_failure());
        assert_eq!(r.measured["max_shape_delta"], 0.0);
        assert_eq!(r.measured["delta_volume_mm3"], 0.0);
        assert!(r.message.contains("no metric moved"), "{}", r.message);
    }

    #[test]
    fn small_move_below_minimum_fails_and_larger_passes() {
        let neutral = signature(&[("extent_x_mm", 68.0)]);
        assert!(judge(Some(&neutral), &signature(&[("extent_x_mm", 68.01)]), 0.05).is_failure());
        let r = judge(Some(&neutral), &signature(&[("extent_x_mm", 67.0)]), 0.05);
        assert!(r.passed(), "{}", r.message);
        assert_eq!(r.measured["delta_extent_x_mm"], -1.0);
    }

    #[test]
    fn nan_metric_fails_and_missing_neutral_skips() {
        let neutral = signature(&[("extent_x_mm", 68.0), ("volume_mm3", 1000.0)]);
        let nan = signature(&[("extent_x_mm", 70.0), ("volume_mm3", f64::NAN)]);
        let (metric, delta) = largest_delta(&neutral, &nan).unwrap();
        assert_eq!(metric, "volume_mm3");
        assert!(delta.is_nan());
        let r = judge(Some(&neutral), &nan, 0.05);
        assert!(r.is_failure());
        assert!(r.message.contains("not finite"), "{}", r.message);
        assert_eq!(judge(None, &neutral, 0.05).status, CheckStatus::Skip);
    }
}
