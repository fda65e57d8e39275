//! Frame swing sweep.
//!
//! The movable frame is posed at a fixed, documented set of angles about
//! the locked pivot axis at each placement. At every pose the gap between
//! frame and body is the smaller of two one-sided measurements: posed frame
//! surface samples against the body, and body vertices against the posed
//! frame. Every pose is measured; the worst row is chosen afterwards.

use std::collections::BTreeMap;

use fit_types::{Threshold, ValidationResult};
use interface_lock::FitGeometry;
use mesh_query::{signed_distance, MeshHandle, QueryError};
use nalgebra::{Isometry3, Point3};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::checks;
use crate::config::{FitThresholds, SamplingConfig};
use crate::min_keep_nan;

/// Angles from `min` to `max` at `step`, both endpoints included, rounded
/// to 1e-6 degrees, with the neutral pose inserted if absent.
pub fn sampled_angles(min_deg: f64, max_deg: f64, step_deg: f64) -> Vec<f64> {
    let (lo, hi) = if max_deg < min_deg {
        (max_deg, min_deg)
    } else {
        (min_deg, max_deg)
    };
    let mut angles = if !(step_deg > 0.0) {
        if lo == hi {
            vec![lo]
        } else {
            vec![lo, hi]
        }
    } else {
        let count = ((hi - lo) / step_deg).floor() as usize + 1;
        let mut v: Vec<f64> = (0..count).map(|i| lo + step_deg * i as f64).collect();
        if v.last().map_or(true, |&last| last < hi - 1e-9) {
            v.push(hi);
        }
        v
    };
    for a in &mut angles {
        *a = (*a * 1e6).round() / 1e6;
        if *a == 0.0 {
            *a = 0.0; // no negative zero
        }
    }
    if !angles.contains(&0.0) {
        let at = angles.partition_point(|&a| a < 0.0);
        angles.insert(at, 0.0);
    }
    angles
}

/// One sampled pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwingSample {
    pub placement_x_mm: f64,
    pub angle_deg: f64,
    pub gap_mm: f64,
}

/// Every sampled pose in sampling order (placements outer, angles inner).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwingSweep {
    pub samples: Vec<SwingSample>,
}

impl SwingSweep {
    /// Smallest gap; the earliest sample wins ties. A NaN gap is worst.
    pub fn worst(&self) -> Option<SwingSample> {
        self.samples.iter().copied().fold(None, |acc, s| match acc {
            Some(w) if w.gap_mm.is_nan() => Some(w),
            Some(w) if !s.gap_mm.is_nan() && s.gap_mm >= w.gap_mm => Some(w),
            _ => Some(s),
        })
    }

    /// Smallest gap among neutral poses.
    pub fn neutral_gap(&self) -> Option<f64> {
        self.samples
            .iter()
            .filter(|s| s.angle_deg == 0.0)
            .map(|s| s.gap_mm)
            .reduce(min_keep_nan)
    }
}

/// Minimum gap between the body and the frame posed by `pose`.
fn pose_gap(
    body: &MeshHandle,
    frame: &MeshHandle,
    frame_samples: &[Point3<f64>],
    pose: &Isometry3<f64>,
) -> Result<f64, QueryError> {
    let mut gap = f64::INFINITY;
    for p in frame_samples {
        gap = min_keep_nan(gap, signed_distance(body, pose * p)?);
    }
    let posed = frame.transformed(pose);
    let bbox = posed.bbox();
    for v in body.mesh().vertices() {
        // Outside the posed box the signed distance is at least the box
        // distance, so such vertices cannot lower the gap.
        if gap > 0.0 && bbox.distance_squared(v) >= gap * gap {
            continue;
        }
        gap = min_keep_nan(gap, signed_distance(&posed, *v)?);
    }
    Ok(gap)
}

/// Pose the frame at every placement and angle and measure each gap.
#[instrument(skip_all, fields(placements = geometry.frame_placements.len()))]
pub fn sweep(
    body: &MeshHandle,
    frame: &MeshHandle,
    geometry: &FitGeometry,
    sampling: &SamplingConfig,
) -> Result<SwingSweep, QueryError> {
    body.check_integrity()?;
    frame.check_integrity()?;
    let angles = sampled_angles(sampling.angle_min_deg, sampling.angle_max_deg, sampling.angle_step_deg);
    let frame_samples = frame.mesh().surface_samples(sampling.surface_sample_spacing_mm);

    let mut samples = Vec::with_capacity(angles.len() * geometry.frame_placements.len());
    for &x in &geometry.frame_placements {
        for &angle in &angles {
            let gap = pose_gap(body, frame, &frame_samples, &geometry.frame_pose(x, angle))?;
            samples.push(SwingSample {
                placement_x_mm: x,
                angle_deg: angle,
                gap_mm: gap,
            });
        }
    }
    debug!(poses = samples.len(), "swing sweep measured");
    Ok(SwingSweep { samples })
}

pub fn validate(
    body: &MeshHandle,
    frame: &MeshHandle,
    geometry: &FitGeometry,
    sampling: &SamplingConfig,
    thresholds: &FitThresholds,
) -> Result<ValidationResult, QueryError> {
    let sweep = sweep(body, frame, geometry, sampling)?;
    Ok(judge(&sweep, thresholds))
}

/// Judge a measured sweep: every gap at or above the minimum, and the
/// neutral gap inside its nominal band.
pub fn judge(sweep: &SwingSweep, thresholds: &FitThresholds) -> ValidationResult {
    let (Some(worst), Some(neutral)) = (sweep.worst(), sweep.neutral_gap()) else {
        return ValidationResult::skip(checks::FRAME_INTERFERENCE, "no frame placements to sample");
    };
    let (band_lo, band_hi) = thresholds.neutral_gap_band_mm();
    let threshold = Threshold::at_least("frame_min_gap_mm", thresholds.frame_min_gap_mm());

    let mut result = ValidationResult::judged(
        checks::FRAME_INTERFERENCE,
        "frame_min_gap_mm",
        worst.gap_mm,
        threshold.clone(),
    );
    let band = Threshold::between("neutral_gap_mm", band_lo, band_hi);
    if result.passed() && !band.admits(neutral) {
        result = ValidationResult::fail(
            checks::FRAME_INTERFERENCE,
            format!("neutral gap {neutral:.4} outside {band}"),
        )
        .with_measured("frame_min_gap_mm", worst.gap_mm)
        .with_threshold(threshold);
    } else {
        result.message = format!(
            "{} (worst at x = {} mm, {} deg)",
            result.message, worst.placement_x_mm, worst.angle_deg
        );
    }

    let rows = sweep
        .samples
        .iter()
        .map(|s| {
            BTreeMap::from([
                ("placement_x_mm".to_string(), s.placement_x_mm),
                ("angle_deg".to_string(), s.angle_deg),
                ("gap_mm".to_string(), s.gap_mm),
            ])
        })
        .collect();
    result
        .with_measured("neutral_gap_mm", neutral)
        .with_measured("worst_angle_deg", worst.angle_deg)
        .with_measured("worst_placement_x_mm", worst.placement_x_mm)
        .with_measured("pose_count", sweep.samples.len() as f64)
        .with_samples(rows)
}
