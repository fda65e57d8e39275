//! Floor clearance under the resting frame.
//!
//! A NaN drop anywhere makes the clearance NaN, which fails the check.

use std::collections::BTreeMap;

use fit_types::{Threshold, ValidationResult};
use interface_lock::FitGeometry;
use mesh_query::{ray_intersect, MeshHandle, QueryError};
use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::checks;
use crate::config::{FitThresholds, SamplingConfig};
use crate::min_keep_nan;

/// Origins start this far below the frame bottom so the cast never
/// reports the frame's own plane.
const ORIGIN_NUDGE: f64 = 1e-4;

/// Vertical clearance under the resting frame.
///
/// Rays go straight down from every frame vertex within the bottom
/// tolerance of the frame's lowest point, at each placement. Clearance is
/// the drop to the first body surface below. Probes that hit nothing are
/// skipped; if none hit, the check fails.
pub fn validate(
    body: &MeshHandle,
    frame: &MeshHandle,
    geometry: &FitGeometry,
    sampling: &SamplingConfig,
    thresholds: &FitThresholds,
) -> Result<ValidationResult, QueryError> {
    body.check_integrity()?;
    frame.check_integrity()?;
    let down = -Vector3::z();
    let body_floor = body.bbox().min.z;

    let mut clearances = Vec::new();
    let mut probes = 0usize;
    let mut rows = Vec::new();
    for &x in &geometry.frame_placements {
        let rest = geometry.frame_rest(x);
        let vertices: Vec<Point3<f64>> = frame.mesh().vertices().iter().map(|v| rest * v).collect();
        let min_z = vertices.iter().map(|v| v.z).fold(f64::INFINITY, f64::min);
        let mut placement_min = f64::INFINITY;
        for p in vertices
            .iter()
            .filter(|v| (v.z - min_z).abs() <= sampling.frame_bottom_tolerance_mm)
        {
            probes += 1;
            let origin = Point3::new(p.x, p.y, p.z - ORIGIN_NUDGE);
            let reach = origin.z - body_floor + 1.0;
            if !(reach > 0.0) {
                continue;
            }
            let Some(&t) = ray_intersect(body, origin, down, reach)?.first() else {
                continue;
            };
            let clearance = p.z - (origin.z - t);
            placement_min = min_keep_nan(placement_min, clearance);
            clearances.push(clearance);
        }
        debug!(x, placement_min, "floor probes cast");
        rows.push(BTreeMap::from([
            ("placement_x_mm".to_string(), x),
            ("frame_bottom_z_mm".to_string(), min_z),
            ("min_clearance_mm".to_string(), placement_min),
        ]));
    }

    let threshold = Threshold::at_least("floor_clearance_mm", thresholds.floor_clearance_min_mm());
    let Some(min) = worst_clearance(&clearances) else {
        return Ok(ValidationResult::fail(
            checks::FLOOR_CLEARANCE,
            format!("none of {probes} floor probes reached the body"),
        )
        .with_threshold(threshold)
        .with_measured("probe_count", probes as f64)
        .with_measured("valid_probe_count", 0.0));
    };
    Ok(
        ValidationResult::judged(checks::FLOOR_CLEARANCE, "floor_clearance_mm", min, threshold)
            .with_measured("probe_count", probes as f64)
            .with_measured("valid_probe_count", clearances.len() as f64)
            .with_samples(rows),
    )
}

/// Smallest clearance, NaN if any clearance is NaN.
fn worst_clearance(clearances: &[f64]) -> Option<f64> {
    clearances.iter().copied().reduce(min_keep_nan)
}
