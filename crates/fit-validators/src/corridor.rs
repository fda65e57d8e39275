//! Insertion corridor: a mating sphere travelling down each slot axis
//! from the entry to the seat.

use std::collections::BTreeMap;

use fit_types::{Threshold, ValidationResult};
use interface_lock::FitGeometry;
use mesh_query::{ray_intersect, signed_distance, MeshHandle, QueryError};
use nalgebra::{Point2, Point3, Vector3};
use tracing::debug;

use crate::checks;
use crate::config::{FitThresholds, SamplingConfig};

/// Sample heights from seat to entry, inclusive.
fn heights(seat_z: f64, entry_z: f64, samples: usize) -> Vec<f64> {
    let n = samples.max(2);
    (0..n)
        .map(|i| seat_z + (entry_z - seat_z) * (i as f64 / (n - 1) as f64))
        .collect()
}

/// Clearance at every sample is `signed_distance - ball_radius`. The
/// result reports the global minimum and where it occurred; the first
/// sample wins ties. A straight cast along each axis must also be
/// unobstructed.
pub fn validate(
    body: &MeshHandle,
    geometry: &FitGeometry,
    axes: &[Point2<f64>],
    sampling: &SamplingConfig,
    thresholds: &FitThresholds,
) -> Result<ValidationResult, QueryError> {
    let ball_radius = geometry.ball_radius();
    let zs = heights(geometry.seat_z, geometry.entry_z, sampling.corridor_samples);
    let depth = geometry.slot_depth().abs();

    let mut worst: Option<(f64, Point3<f64>)> = None;
    let mut obstructions = 0usize;
    let mut rows = Vec::with_capacity(axes.len());
    for axis in axes {
        let mut axis_min = f64::INFINITY;
        for &z in &zs {
            let p = Point3::new(axis.x, axis.y, z);
            let clearance = signed_distance(body, p)? - ball_radius;
            axis_min = axis_min.min(clearance);
            if worst.map_or(true, |(w, _)| clearance < w) {
                worst = Some((clearance, p));
            }
        }
        let seat = Point3::new(axis.x, axis.y, geometry.seat_z.min(geometry.entry_z));
        let hits = ray_intersect(body, seat, Vector3::z(), depth)?;
        obstructions += hits.len();
        debug!(x = axis.x, y = axis.y, axis_min, hits = hits.len(), "corridor sampled");
        rows.push(BTreeMap::from([
            ("axis_x_mm".to_string(), axis.x),
            ("axis_y_mm".to_string(), axis.y),
            ("min_clearance_mm".to_string(), axis_min),
            ("obstructions".to_string(), hits.len() as f64),
        ]));
    }

    let Some((min_clearance, at)) = worst else {
        return Ok(ValidationResult::skip(checks::INSERTION_CORRIDOR, "no slot axes to sample"));
    };
    let threshold = Threshold::at_least(
        "corridor_min_clearance_mm",
        thresholds.corridor_min_clearance_mm(),
    );
    let mut result = ValidationResult::judged(
        checks::INSERTION_CORRIDOR,
        "corridor_min_clearance_mm",
        min_clearance,
        threshold.clone(),
    );
    if min_clearance < 0.0 {
        result.message = format!(
            "sphere collides: clearance {min_clearance:.4} at ({:.3}, {:.3}, {:.3})",
            at.x, at.y, at.z
        );
    } else if obstructions > 0 {
        result = ValidationResult::fail(
            checks::INSERTION_CORRIDOR,
            format!("{obstructions} surface crossings along the slot axes"),
        )
        .with_measured("corridor_min_clearance_mm", min_clearance)
        .with_threshold(threshold);
    }
    Ok(result
        .with_measured("corridor_min_free_radius_mm", min_clearance + ball_radius)
        .with_measured("worst_x_mm", at.x)
        .with_measured("worst_y_mm", at.y)
        .with_measured("worst_z_mm", at.z)
        .with_measured("obstructions", obstructions as f64)
        .with_samples(rows))
}
