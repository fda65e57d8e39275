//! Geometric queries against a trusted [`MeshHandle`].
//!
//! Every public query first checks the handle's integrity and returns
//! [`QueryError::MeshIntegrity`] instead of a number when the mesh is open
//! or has more than one shell. Distances are in the mesh's units; signed
//! distance is positive outside the solid and negative inside.

use nalgebra::{Point3, Vector3};

use crate::error::QueryError;
use crate::mesh::MeshHandle;

/// Hits closer together than this along one ray count as one crossing.
const HIT_MERGE_EPS: f64 = 1e-9;

/// Offset used to step off a surface before casting.
const SURFACE_EPS: f64 = 1e-4;

/// Fixed skew directions for the inside/outside vote. Chosen so that no
/// component is zero and no two are rational multiples, which keeps the
/// rays clear of axis-aligned edges and vertices.
const PARITY_DIRECTIONS: [[f64; 3]; 3] = [
    [0.577_215_66, 0.618_033_99, 0.533_426_48],
    [-0.707_106_78, 0.301_029_99, -0.640_169_21],
    [0.271_828_18, -0.836_660_03, 0.475_711_02],
];

/// A closest point on the mesh surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub point: Point3<f64>,
    pub distance: f64,
    pub triangle: usize,
}

/// Closest point on triangle `(v0, v1, v2)` to `point`.
///
/// Region classification after Ericson, *Real-Time Collision Detection*, 5.1.5.
pub fn closest_point_on_triangle(
    point: Point3<f64>,
    v0: Point3<f64>,
    v1: Point3<f64>,
    v2: Point3<f64>,
) -> Point3<f64> {
    let ab = v1 - v0;
    let ac = v2 - v0;
    let ap = point - v0;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return v0;
    }

    let bp = point - v1;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return v1;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return v0 + ab * (d1 / (d1 - d3));
    }

    let cp = point - v2;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return v2;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return v0 + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return v1 + (v2 - v1) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    v0 + ab * (vb * denom) + ac * (vc * denom)
}

/// Möller–Trumbore ray/triangle test. Returns the ray parameter of the hit.
pub fn ray_triangle_intersect(
    origin: Point3<f64>,
    dir: Vector3<f64>,
    v0: Point3<f64>,
    v1: Point3<f64>,
    v2: Point3<f64>,
) -> Option<f64> {
    const EPSILON: f64 = 1e-12;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = dir.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() < EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * dir.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(&q);
    (t > EPSILON).then_some(t)
}

fn unit(direction: &Vector3<f64>) -> Result<Vector3<f64>, QueryError> {
    direction
        .try_normalize(1e-12)
        .filter(|d| d.iter().all(|c| c.is_finite()))
        .ok_or_else(|| QueryError::InvalidQuery {
            reason: format!("direction {direction:?} has no usable length"),
        })
}

fn finite(point: &Point3<f64>) -> Result<(), QueryError> {
    if point.coords.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(QueryError::InvalidQuery {
            reason: format!("point {point:?} is not finite"),
        })
    }
}

fn nearest_unchecked(mesh: &MeshHandle, point: &Point3<f64>) -> Option<SurfacePoint> {
    let tri_mesh = mesh.mesh();
    mesh.bvh()
        .nearest(point, |tri| {
            let [a, b, c] = tri_mesh.triangle(tri as usize);
            let closest = closest_point_on_triangle(*point, a, b, c);
            ((closest - point).norm_squared(), closest)
        })
        .map(|(tri, d2, closest)| SurfacePoint {
            point: closest,
            distance: d2.sqrt(),
            triangle: tri as usize,
        })
}

/// Sorted, merged hit distances. `dir` must be unit length.
fn hits_unchecked(
    mesh: &MeshHandle,
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
    max_distance: f64,
) -> Vec<f64> {
    let tri_mesh = mesh.mesh();
    let mut hits: Vec<f64> = mesh
        .bvh()
        .ray_candidates(origin, dir, max_distance)
        .into_iter()
        .filter_map(|tri| {
            let [a, b, c] = tri_mesh.triangle(tri as usize);
            ray_triangle_intersect(*origin, *dir, a, b, c)
        })
        .filter(|&t| t <= max_distance)
        .collect();
    hits.sort_by(f64::total_cmp);
    hits.dedup_by(|later, earlier| (*later - *earlier).abs() <= HIT_MERGE_EPS);
    hits
}

fn inside_unchecked(mesh: &MeshHandle, point: &Point3<f64>) -> bool {
    let reach = mesh.bbox().diagonal() * 2.0 + 1.0;
    let votes = PARITY_DIRECTIONS
        .iter()
        .filter(|d| {
            let dir = Vector3::new(d[0], d[1], d[2]).normalize();
            hits_unchecked(mesh, point, &dir, reach).len() % 2 == 1
        })
        .count();
    votes >= 2
}

/// Nearest point on the surface and its distance.
pub fn nearest_surface_point(
    mesh: &MeshHandle,
    point: Point3<f64>,
) -> Result<SurfacePoint, QueryError> {
    mesh.check_integrity()?;
    finite(&point)?;
    nearest_unchecked(mesh, &point).ok_or_else(|| QueryError::InvalidQuery {
        reason: "mesh has no triangles".to_string(),
    })
}

/// Whether `point` lies inside the solid (ray-parity majority vote).
pub fn is_inside(mesh: &MeshHandle, point: Point3<f64>) -> Result<bool, QueryError> {
    mesh.check_integrity()?;
    finite(&point)?;
    Ok(inside_unchecked(mesh, &point))
}

/// Signed distance: positive outside, negative inside, zero on the surface.
pub fn signed_distance(mesh: &MeshHandle, point: Point3<f64>) -> Result<f64, QueryError> {
    let nearest = nearest_surface_point(mesh, point)?;
    if nearest.distance == 0.0 {
        return Ok(0.0);
    }
    if inside_unchecked(mesh, &point) {
        Ok(-nearest.distance)
    } else {
        Ok(nearest.distance)
    }
}

/// All surface crossings of the ray within `max_distance`, ascending.
///
/// Crossings through a shared edge or vertex are reported once.
pub fn ray_intersect(
    mesh: &MeshHandle,
    origin: Point3<f64>,
    direction: Vector3<f64>,
    max_distance: f64,
) -> Result<Vec<f64>, QueryError> {
    mesh.check_integrity()?;
    finite(&origin)?;
    let dir = unit(&direction)?;
    if !(max_distance >= 0.0) {
        return Err(QueryError::InvalidQuery {
            reason: format!("max distance {max_distance} is negative"),
        });
    }
    Ok(hits_unchecked(mesh, &origin, &dir, max_distance))
}

/// Local wall thickness at a surface point.
///
/// Casts from just inside `point` along `inward` to the first far-side
/// crossing, then casts back from that crossing. The sample is kept only
/// when the return distance agrees with the outbound one and the midpoint
/// of the chord lies inside the solid. `Ok(None)` means no trustworthy
/// sample exists at this point (e.g. a grazing ray or a wrong-facing
/// direction).
pub fn local_thickness_sample(
    mesh: &MeshHandle,
    point: Point3<f64>,
    inward: Vector3<f64>,
) -> Result<Option<f64>, QueryError> {
    mesh.check_integrity()?;
    finite(&point)?;
    let dir = unit(&inward)?;
    let reach = mesh.bbox().diagonal() * 2.0 + 1.0;

    let start = point + dir * SURFACE_EPS;
    let Some(&t_out) = hits_unchecked(mesh, &start, &dir, reach).first() else {
        return Ok(None);
    };
    let outbound = t_out + SURFACE_EPS;
    let far = start + dir * t_out;

    let back_start = far - dir * SURFACE_EPS;
    let Some(&t_back) = hits_unchecked(mesh, &back_start, &-dir, reach).first() else {
        return Ok(None);
    };
    let inbound = t_back + SURFACE_EPS;

    if (inbound - outbound).abs() > 1e-3 * outbound + 2.0 * SURFACE_EPS {
        return Ok(None);
    }
    let midpoint = point + dir * (outbound * 0.5);
    if !inside_unchecked(mesh, &midpoint) {
        return Ok(None);
    }
    Ok(Some(outbound))
}
