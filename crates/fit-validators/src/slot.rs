//! Slot axes and depth.
//!
//! Each bore is located by scanning a square grid at seat height for the
//! point with the most free space around it. The observed axis must lie
//! within tolerance of the locked one, and a ring of probes at the mating
//! sphere's radius just above the seat must all be in open space.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use fit_types::{Threshold, ValidationResult};
use interface_lock::FitGeometry;
use mesh_query::{signed_distance, MeshHandle, QueryError};
use nalgebra::{Point2, Point3, Vector2};
use tracing::debug;

use crate::checks;
use crate::config::{FitThresholds, SamplingConfig};

/// Where one slot axis was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisFix {
    pub expected: Point2<f64>,
    pub observed: Point2<f64>,
    /// Free radius at the observed axis, at seat height.
    pub free_radius: f64,
}

impl AxisFix {
    pub fn error(&self) -> f64 {
        (self.observed - self.expected).norm()
    }
}

/// Grid coordinates centred on `center`, `2 * radius` wide.
fn scan_offsets(radius: f64, step: f64) -> Vec<f64> {
    let n = ((2.0 * radius) / step).round() as usize + 1;
    if n == 1 {
        return vec![0.0];
    }
    (0..n)
        .map(|i| -radius + 2.0 * radius * (i as f64 / (n - 1) as f64))
        .collect()
}

/// Locate every slot axis. Grid points are visited row by row (y outer,
/// x inner); the first maximum wins.
pub fn locate_axes(
    body: &MeshHandle,
    geometry: &FitGeometry,
    sampling: &SamplingConfig,
) -> Result<Vec<AxisFix>, QueryError> {
    let offsets = scan_offsets(sampling.axis_scan_radius_mm, sampling.axis_scan_step_mm);
    geometry
        .slot_axes
        .iter()
        .map(|&expected| {
            let mut best = AxisFix {
                expected,
                observed: expected,
                free_radius: f64::NEG_INFINITY,
            };
            for dy in &offsets {
                for dx in &offsets {
                    let p = expected + Vector2::new(*dx, *dy);
                    let free = signed_distance(body, Point3::new(p.x, p.y, geometry.seat_z))?;
                    if free > best.free_radius {
                        best.observed = p;
                        best.free_radius = free;
                    }
                }
            }
            Ok(best)
        })
        .collect()
}

/// Smallest signed distance over the probe ring around `axis`.
fn ring_clearance(
    body: &MeshHandle,
    axis: Point2<f64>,
    z: f64,
    radius: f64,
    probes: usize,
) -> Result<f64, QueryError> {
    let mut worst = f64::INFINITY;
    for k in 0..probes {
        let angle = TAU * k as f64 / probes as f64;
        let p = Point3::new(axis.x + radius * angle.cos(), axis.y + radius * angle.sin(), z);
        worst = worst.min(signed_distance(body, p)?);
    }
    Ok(worst)
}

/// Judge located axes: position error and open ring.
pub fn judge_axes(
    fixes: &[AxisFix],
    body: &MeshHandle,
    geometry: &FitGeometry,
    sampling: &SamplingConfig,
    thresholds: &FitThresholds,
) -> Result<ValidationResult, QueryError> {
    let ring_z = geometry.seat_z + sampling.ring_lift_mm;
    let mut rows = Vec::with_capacity(fixes.len());
    let mut max_error = 0.0f64;
    let mut min_free = f64::INFINITY;
    let mut min_ring = f64::INFINITY;
    for fix in fixes {
        let ring = ring_clearance(body, fix.observed, ring_z, geometry.ball_radius(), sampling.ring_probes)?;
        debug!(expected = ?fix.expected, error = fix.error(), ring, "slot axis located");
        max_error = max_error.max(fix.error());
        min_free = min_free.min(fix.free_radius);
        min_ring = min_ring.min(ring);
        rows.push(BTreeMap::from([
            ("expected_x_mm".to_string(), fix.expected.x),
            ("expected_y_mm".to_string(), fix.expected.y),
            ("observed_x_mm".to_string(), fix.observed.x),
            ("observed_y_mm".to_string(), fix.observed.y),
            ("axis_error_mm".to_string(), fix.error()),
            ("seat_free_radius_mm".to_string(), fix.free_radius),
            ("ring_min_clearance_mm".to_string(), ring),
        ]));
    }

    let threshold = Threshold::at_most("axis_error_mm", thresholds.axis_tolerance_mm());
    let mut result = ValidationResult::judged(checks::SLOT_AXIS, "axis_error_mm", max_error, threshold);
    if result.passed() && !(min_ring > 0.0) {
        result = ValidationResult::fail(
            checks::SLOT_AXIS,
            format!("probe ring at r = {:.4} is obstructed (min clearance {min_ring:.4})", geometry.ball_radius()),
        )
        .with_measured("axis_error_mm", max_error)
        .with_threshold(Threshold::at_most("axis_error_mm", thresholds.axis_tolerance_mm()));
    }
    Ok(result
        .with_measured("seat_free_radius_mm", min_free)
        .with_measured("ring_min_clearance_mm", min_ring)
        .with_samples(rows))
}

/// Entry-to-seat depth of the locked geometry.
pub fn validate_depth(geometry: &FitGeometry, thresholds: &FitThresholds) -> ValidationResult {
    ValidationResult::judged(
        checks::SLOT_DEPTH,
        "slot_depth_mm",
        geometry.slot_depth(),
        Threshold::within(
            "slot_depth_mm",
            thresholds.slot_depth_target_mm(),
            thresholds.slot_depth_tolerance_mm(),
        ),
    )
}
