//! Property-based tests for swing-angle sampling and threshold judgement.

use fit_types::Threshold;
use fit_validators::kinematics::sampled_angles;
use proptest::prelude::*;

proptest! {
    #[test]
    fn angles_cover_both_ends_and_neutral(
        lo in -60.0f64..-0.5,
        hi in 0.5f64..60.0,
        step in 0.25f64..10.0,
    ) {
        let angles = sampled_angles(lo, hi, step);
        let round = |a: f64| (a * 1e6).round() / 1e6;
        prop_assert_eq!(angles[0], round(lo));
        prop_assert_eq!(*angles.last().unwrap(), round(hi));
        for pair in angles.windows(2) {
            prop_assert!(pair[0] < pair[1]);
            prop_assert!(pair[1] - pair[0] <= step + 1e-6);
        }
        prop_assert!(angles.contains(&0.0));
    }

    #[test]
    fn swapped_bounds_sample_the_same_angles(
        lo in -60.0f64..0.0,
        span in 0.5f64..90.0,
        step in 0.25f64..10.0,
    ) {
        prop_assert_eq!(sampled_angles(lo, lo + span, step), sampled_angles(lo + span, lo, step));
    }

    #[test]
    fn at_least_admits_exactly_the_values_above(min in -5.0f64..5.0, v in -10.0f64..10.0) {
        prop_assert_eq!(Threshold::at_least("m", min).admits(v), v >= min);
        prop_assert!(!Threshold::at_least("m", min).admits(f64::NAN));
    }
}
