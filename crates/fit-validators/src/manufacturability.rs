//! Printability: wall thickness, bed footprint and overhang.

use fit_types::{Threshold, ValidationResult};
use mesh_query::{local_thickness_sample, MeshHandle, QueryError};
use nalgebra::Point2;
use tracing::debug;

use crate::checks;
use crate::config::{FitThresholds, SamplingConfig};

// ── Wall thickness ──────────────────────────────────────────────────────────

/// Linear-interpolated percentile of sorted values.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = pct.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

/// Face indices ordered by centroid (x, then y, then z) and evenly
/// subsampled down to `count`.
fn probe_faces(body: &MeshHandle, count: usize) -> Vec<usize> {
    let mesh = body.mesh();
    let centroids: Vec<_> = (0..mesh.triangle_count()).map(|i| mesh.face_centroid(i)).collect();
    let mut order: Vec<usize> = (0..centroids.len()).collect();
    order.sort_by(|&a, &b| {
        let (p, q) = (centroids[a], centroids[b]);
        p.x.total_cmp(&q.x)
            .then(p.y.total_cmp(&q.y))
            .then(p.z.total_cmp(&q.z))
            .then(a.cmp(&b))
    });
    let total = order.len();
    if total <= count || count == 0 {
        return order;
    }
    if count == 1 {
        return vec![order[0]];
    }
    (0..count)
        .map(|i| order[i * (total - 1) / (count - 1)])
        .collect()
}

/// Sampled local thickness, judged on a low percentile so a handful of
/// grazing probes cannot fail a sound part.
pub fn wall_thickness(
    body: &MeshHandle,
    sampling: &SamplingConfig,
    thresholds: &FitThresholds,
) -> Result<ValidationResult, QueryError> {
    body.check_integrity()?;
    let mesh = body.mesh();
    let faces = probe_faces(body, sampling.thickness_probes);
    let floor = sampling.thickness_noise_floor_mm.max(1e-6);

    let mut values = Vec::with_capacity(faces.len());
    for &i in &faces {
        if let Some(t) = local_thickness_sample(body, mesh.face_centroid(i), -mesh.face_normal(i))? {
            if t.is_finite() && t > floor {
                values.push(t);
            }
        }
    }
    values.sort_by(f64::total_cmp);
    debug!(probes = faces.len(), valid = values.len(), "thickness probes cast");

    let threshold = Threshold::at_least("wall_thickness_mm", thresholds.min_wall_thickness_mm());
    let Some(robust) = percentile(&values, sampling.thickness_percentile) else {
        return Ok(ValidationResult::fail(checks::WALL_THICKNESS, "no valid thickness probes")
            .with_threshold(threshold)
            .with_measured("probe_count", faces.len() as f64)
            .with_measured("valid_probe_count", 0.0));
    };

    let mut result = ValidationResult::judged(checks::WALL_THICKNESS, "wall_thickness_mm", robust, threshold.clone());
    if values.len() < sampling.thickness_min_valid {
        result = ValidationResult::fail(
            checks::WALL_THICKNESS,
            format!(
                "only {} of {} probes valid (need {})",
                values.len(),
                faces.len(),
                sampling.thickness_min_valid
            ),
        )
        .with_measured("wall_thickness_mm", robust)
        .with_threshold(threshold);
    }
    Ok(result
        .with_measured("wall_thickness_min_mm", values[0])
        .with_measured("wall_thickness_median_mm", percentile(&values, 50.0).unwrap_or(robust))
        .with_measured("wall_thickness_max_mm", values[values.len() - 1])
        .with_measured("probe_count", faces.len() as f64)
        .with_measured("valid_probe_count", values.len() as f64))
}

// ── Contact footprint ───────────────────────────────────────────────────────

fn cross(o: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Monotone-chain convex hull, counter-clockwise, no collinear points.
pub fn convex_hull(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    let mut lower: Vec<Point2<f64>> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point2<f64>> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Shoelace area.
pub fn polygon_area(polygon: &[Point2<f64>]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let n = polygon.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let (a, b) = (polygon[i], polygon[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice.abs() * 0.5
}

/// Area and spans of the hull of every vertex resting on the bed.
pub fn contact_footprint(
    body: &MeshHandle,
    sampling: &SamplingConfig,
    thresholds: &FitThresholds,
) -> Result<ValidationResult, QueryError> {
    body.check_integrity()?;
    let min_z = body.bbox().min.z;
    let contact: Vec<Point2<f64>> = body
        .mesh()
        .vertices()
        .iter()
        .filter(|v| v.z <= min_z + sampling.contact_tolerance_mm)
        .map(|v| Point2::new(v.x, v.y))
        .collect();

    let span = |f: fn(&Point2<f64>) -> f64| {
        let lo = contact.iter().map(f).fold(f64::INFINITY, f64::min);
        let hi = contact.iter().map(f).fold(f64::NEG_INFINITY, f64::max);
        if contact.is_empty() {
            0.0
        } else {
            hi - lo
        }
    };
    let span_x = span(|p| p.x);
    let span_y = span(|p| p.y);
    let area = polygon_area(&convex_hull(&contact));

    let (min_x, min_y) = thresholds.min_contact_span_mm();
    let threshold = Threshold::at_least("contact_area_mm2", thresholds.min_contact_area_mm2());
    let mut result = ValidationResult::judged(checks::CONTACT_FOOTPRINT, "contact_area_mm2", area, threshold.clone());
    let narrow: Vec<String> = [("x", span_x, min_x), ("y", span_y, min_y)]
        .into_iter()
        .filter(|(_, span, min)| !(span >= min))
        .map(|(axis, span, min)| format!("span {axis} {span:.3} < {min}"))
        .collect();
    if result.passed() && !narrow.is_empty() {
        result = ValidationResult::fail(checks::CONTACT_FOOTPRINT, narrow.join(", "))
            .with_measured("contact_area_mm2", area)
            .with_threshold(threshold);
    }
    Ok(result
        .with_measured("contact_span_x_mm", span_x)
        .with_measured("contact_span_y_mm", span_y)
        .with_measured("contact_point_count", contact.len() as f64))
}

// ── Overhang (advisory) ─────────────────────────────────────────────────────

/// Share of downward-facing area steeper than the overhang limit.
///
/// Faces resting on the bed are supported and left out of both sums.
pub fn overhang_risk(
    body: &MeshHandle,
    sampling: &SamplingConfig,
    thresholds: &FitThresholds,
) -> Result<ValidationResult, QueryError> {
    body.check_integrity()?;
    let mesh = body.mesh();
    let bed = body.bbox().min.z + sampling.contact_tolerance_mm;
    let limit = thresholds.overhang_angle_deg().to_radians().cos();

    let mut downward = 0.0;
    let mut risky = 0.0;
    for i in 0..mesh.triangle_count() {
        let n = mesh.face_normal(i);
        if !(n.z < -1e-6) {
            continue;
        }
        if mesh.triangle(i).iter().all(|v| v.z <= bed) {
            continue;
        }
        let area = mesh.face_area(i);
        downward += area;
        if n.z.abs() >= limit {
            risky += area;
        }
    }
    let ratio = if downward > 1e-9 { risky / downward } else { 0.0 };
    let threshold = Threshold::at_most("overhang_ratio", thresholds.max_overhang_ratio());
    Ok(
        ValidationResult::judged(checks::OVERHANG_RISK, "overhang_ratio", ratio, threshold)
            .with_measured("downward_area_mm2", downward)
            .with_measured("risky_area_mm2", risky)
            .advisory(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_query::primitives::cuboid;
    use nalgebra::Point3;

    fn slab() -> MeshHandle {
        MeshHandle::new("slab", cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(80.0, 30.0, 4.0)))
    }

    #[test]
    fn percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&v, 0.0), Some(1.0));
        assert_eq!(percentile(&v, 50.0), Some(3.0));
        assert_relative_eq!(percentile(&v, 5.0).unwrap(), 1.2);
        assert_eq!(percentile(&[], 5.0), None);
    }

    #[test]
    fn hull_of_square_with_interior_points() {
        let pts = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
            Point2::new(1.0, 0.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert_relative_eq!(polygon_area(&hull), 4.0);
    }

    #[test]
    fn slab_footprint_and_thickness() {
        let body = slab();
        let s = SamplingConfig {
            thickness_min_valid: 4,
            ..SamplingConfig::default()
        };
        let t = FitThresholds::default();
        let foot = contact_footprint(&body, &s, &t).unwrap();
        assert!(foot.passed(), "{}", foot.message);
        assert_relative_eq!(foot.measured["contact_area_mm2"], 2400.0, epsilon = 1e-9);

        let wall = wall_thickness(&body, &s, &t).unwrap();
        assert!(wall.passed(), "{}", wall.message);
        assert!(wall.measured["wall_thickness_min_mm"] >= 4.0 - 1e-6);
    }

    #[test]
    fn narrow_footprint_fails_on_span() {
        let body = MeshHandle::new("bar", cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(100.0, 10.0, 4.0)));
        let r = contact_footprint(&body, &SamplingConfig::default(), &FitThresholds::default()).unwrap();
        assert!(r.is_failure());
        assert!(r.message.contains("span y"));
    }

    #[test]
    fn bed_faces_are_not_overhangs() {
        let r = overhang_risk(&slab(), &SamplingConfig::default(), &FitThresholds::default()).unwrap();
        assert!(!r.blocking);
        assert_eq!(r.measured["overhang_ratio"], 0.0);
        assert_eq!(r.measured["downward_area_mm2"], 0.0);
    }

    #[test]
    fn sphere_underside_is_partly_risky() {
        let ball = mesh_query::primitives::uv_sphere(Point3::new(0.0, 0.0, 10.0), 10.0, 32, 16);
        let body = MeshHandle::new("ball", ball);
        let r = overhang_risk(&body, &SamplingConfig::default(), &FitThresholds::default()).unwrap();
        let ratio = r.measured["overhang_ratio"];
        assert!(ratio > 0.2 && ratio < 0.35, "ratio {ratio}");
        assert!(r.measured["risky_area_mm2"] > 0.0);
        assert!(r.passed());
    }
}
