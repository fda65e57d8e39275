//! Welded triangle meshes and the shared, immutable handle the queries run on.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use nalgebra::{Isometry3, Point3, Vector3};

use crate::bvh::{Aabb, Bvh};
use crate::error::{IntegrityIssue, MeshLoadError, QueryError};

/// Vertices closer than this are welded into one.
pub const WELD_TOLERANCE: f64 = 1e-4;

const DEGENERATE_AREA: f64 = 1e-12;

/// Indexed triangle mesh in millimetres.
#[derive(Debug, Clone, PartialEq)]
pub struct TriMesh {
    vertices: Vec<Point3<f64>>,
    faces: Vec<[u32; 3]>,
}

impl TriMesh {
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Result<Self, MeshLoadError> {
        for face in &faces {
            for &index in face {
                if index as usize >= vertices.len() {
                    return Err(MeshLoadError::IndexOutOfRange {
                        index,
                        vertex_count: vertices.len(),
                    });
                }
            }
        }
        Ok(Self { vertices, faces })
    }

    /// Caller guarantees every index is in range.
    pub(crate) fn from_raw(vertices: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Weld a triangle soup by quantised position.
    ///
    /// Returns the mesh and the number of degenerate triangles dropped.
    pub fn from_soup(triangles: &[[Point3<f64>; 3]]) -> Result<(Self, usize), MeshLoadError> {
        let mut lookup: HashMap<[i64; 3], u32> = HashMap::new();
        let mut vertices = Vec::new();
        let mut faces = Vec::with_capacity(triangles.len());
        let mut dropped = 0usize;

        for tri in triangles {
            let mut face = [0u32; 3];
            for (slot, p) in face.iter_mut().zip(tri.iter()) {
                // NaN quantises to 0, so non-finite points stay unwelded and visible.
                if !is_finite(p) {
                    vertices.push(*p);
                    *slot = (vertices.len() - 1) as u32;
                    continue;
                }
                let key = [
                    (p.x / WELD_TOLERANCE).round() as i64,
                    (p.y / WELD_TOLERANCE).round() as i64,
                    (p.z / WELD_TOLERANCE).round() as i64,
                ];
                *slot = *lookup.entry(key).or_insert_with(|| {
                    vertices.push(*p);
                    (vertices.len() - 1) as u32
                });
            }
            let repeated = face[0] == face[1] || face[1] == face[2] || face[0] == face[2];
            if repeated || triangle_area(tri) < DEGENERATE_AREA {
                dropped += 1;
                continue;
            }
            faces.push(face);
        }

        if faces.is_empty() {
            return Err(MeshLoadError::Empty);
        }
        Ok((Self { vertices, faces }, dropped))
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// Vertices with a NaN or infinite coordinate.
    pub fn non_finite_count(&self) -> usize {
        self.vertices.iter().filter(|p| !is_finite(p)).count()
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    pub fn triangle(&self, index: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.faces[index];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Unit normal by winding; zero for a degenerate triangle.
    pub fn face_normal(&self, index: usize) -> Vector3<f64> {
        let [a, b, c] = self.triangle(index);
        (b - a).cross(&(c - a)).try_normalize(1e-300).unwrap_or_else(Vector3::zeros)
    }

    pub fn face_area(&self, index: usize) -> f64 {
        triangle_area(&self.triangle(index))
    }

    pub fn face_centroid(&self, index: usize) -> Point3<f64> {
        let [a, b, c] = self.triangle(index);
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    pub fn bbox(&self) -> Aabb {
        Aabb::from_points(&self.vertices)
    }

    pub fn extents(&self) -> Vector3<f64> {
        self.bbox().extents()
    }

    /// Enclosed volume by the divergence theorem. Negative for inward winding.
    pub fn signed_volume(&self) -> f64 {
        (0..self.faces.len())
            .map(|i| {
                let [a, b, c] = self.triangle(i);
                a.coords.dot(&b.coords.cross(&c.coords))
            })
            .sum::<f64>()
            / 6.0
    }

    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    pub fn surface_area(&self) -> f64 {
        (0..self.faces.len()).map(|i| self.face_area(i)).sum()
    }

    /// Rigidly transformed copy. Winding is preserved.
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            vertices: self.vertices.iter().map(|p| iso * p).collect(),
            faces: self.faces.clone(),
        }
    }

    /// Number of undirected edges not used by exactly two triangles.
    pub fn open_edge_count(&self) -> usize {
        let mut uses: HashMap<(u32, u32), u32> = HashMap::new();
        for face in &self.faces {
            for k in 0..3 {
                let (a, b) = (face[k], face[(k + 1) % 3]);
                *uses.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        uses.values().filter(|&&n| n != 2).count()
    }

    /// Connected components over shared vertices.
    pub fn component_count(&self) -> usize {
        if self.faces.is_empty() {
            return 0;
        }
        let mut parent: Vec<u32> = (0..self.vertices.len() as u32).collect();
        fn find(parent: &mut [u32], mut x: u32) -> u32 {
            while parent[x as usize] != x {
                parent[x as usize] = parent[parent[x as usize] as usize];
                x = parent[x as usize];
            }
            x
        }
        for face in &self.faces {
            let r0 = find(&mut parent, face[0]);
            for &v in &face[1..] {
                let r = find(&mut parent, v);
                if r != r0 {
                    parent[r as usize] = r0;
                }
            }
        }
        let mut used = vec![false; self.vertices.len()];
        for face in &self.faces {
            for &v in face {
                used[v as usize] = true;
            }
        }
        let mut roots: Vec<u32> = (0..self.vertices.len() as u32)
            .filter(|&v| used[v as usize])
            .map(|v| find(&mut parent, v))
            .collect();
        roots.sort_unstable();
        roots.dedup();
        roots.len()
    }

    /// Deterministic surface point set: every vertex, then for each
    /// triangle in index order the interior points of a barycentric grid
    /// fine enough that no grid step exceeds `spacing`.
    pub fn surface_samples(&self, spacing: f64) -> Vec<Point3<f64>> {
        let mut samples = self.vertices.clone();
        if !(spacing > 0.0) {
            return samples;
        }
        for i in 0..self.faces.len() {
            let [a, b, c] = self.triangle(i);
            let longest = (b - a).norm().max((c - b).norm()).max((a - c).norm());
            let n = (longest / spacing).ceil().max(1.0) as usize;
            for p in 0..=n {
                for q in 0..=(n - p) {
                    let r = n - p - q;
                    if p == n || q == n || r == n {
                        continue;
                    }
                    let (wp, wq, wr) = (p as f64 / n as f64, q as f64 / n as f64, r as f64 / n as f64);
                    samples.push(Point3::from(a.coords * wp + b.coords * wq + c.coords * wr));
                }
            }
        }
        samples
    }
}

fn is_finite(p: &Point3<f64>) -> bool {
    p.coords.iter().all(|c| c.is_finite())
}

fn triangle_area(tri: &[Point3<f64>; 3]) -> f64 {
    (tri[1] - tri[0]).cross(&(tri[2] - tri[0])).norm() * 0.5
}

#[derive(Debug)]
struct MeshData {
    label: String,
    mesh: TriMesh,
    bbox: Aabb,
    open_edges: usize,
    components: usize,
    non_finite: usize,
    degenerate_dropped: usize,
    bvh: Bvh,
}

/// Shared, immutable mesh plus its derived attributes.
///
/// Cloning is cheap. Queries only trust a handle whose coordinates are all
/// finite, that is watertight and has exactly one connected component.
#[derive(Debug, Clone)]
pub struct MeshHandle(Arc<MeshData>);

impl MeshHandle {
    pub fn new(label: impl Into<String>, mesh: TriMesh) -> Self {
        Self::with_dropped(label, mesh, 0)
    }

    fn with_dropped(label: impl Into<String>, mesh: TriMesh, degenerate_dropped: usize) -> Self {
        let bbox = mesh.bbox();
        let open_edges = mesh.open_edge_count();
        let components = mesh.component_count();
        let non_finite = mesh.non_finite_count();
        let bvh = Bvh::build(mesh.vertices(), mesh.faces());
        Self(Arc::new(MeshData {
            label: label.into(),
            mesh,
            bbox,
            open_edges,
            components,
            non_finite,
            degenerate_dropped,
            bvh,
        }))
    }

    /// Load and weld an STL file (binary or ASCII).
    pub fn load_stl(path: &Path, label: impl Into<String>) -> Result<Self, MeshLoadError> {
        let soup = crate::stl::read_stl(path)?;
        let (mesh, dropped) = TriMesh::from_soup(&soup)?;
        let handle = Self::with_dropped(label, mesh, dropped);
        tracing::debug!(
            path = %path.display(),
            triangles = handle.triangle_count(),
            dropped,
            watertight = handle.is_watertight(),
            components = handle.component_count(),
            "loaded mesh"
        );
        Ok(handle)
    }

    pub fn label(&self) -> &str {
        &self.0.label
    }

    pub fn mesh(&self) -> &TriMesh {
        &self.0.mesh
    }

    pub fn bbox(&self) -> Aabb {
        self.0.bbox
    }

    pub fn triangle_count(&self) -> usize {
        self.0.mesh.triangle_count()
    }

    pub fn is_watertight(&self) -> bool {
        self.0.open_edges == 0 && self.0.mesh.triangle_count() > 0
    }

    pub fn component_count(&self) -> usize {
        self.0.components
    }

    pub fn degenerate_dropped(&self) -> usize {
        self.0.degenerate_dropped
    }

    /// `Ok` only for a single closed shell with finite coordinates.
    pub fn check_integrity(&self) -> Result<(), QueryError> {
        let issue = if self.0.mesh.triangle_count() == 0 {
            Some(IntegrityIssue::Empty)
        } else if self.0.non_finite > 0 {
            Some(IntegrityIssue::NonFinite {
                count: self.0.non_finite,
            })
        } else if self.0.open_edges > 0 {
            Some(IntegrityIssue::OpenEdges {
                count: self.0.open_edges,
            })
        } else if self.0.components != 1 {
            Some(IntegrityIssue::MultipleComponents {
                count: self.0.components,
            })
        } else {
            None
        };
        match issue {
            None => Ok(()),
            Some(issue) => Err(QueryError::MeshIntegrity {
                label: self.0.label.clone(),
                issue,
            }),
        }
    }

    pub fn is_trusted(&self) -> bool {
        self.check_integrity().is_ok()
    }

    /// A new handle for the rigidly moved mesh. Integrity is preserved.
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self::with_dropped(
            self.0.label.clone(),
            self.0.mesh.transformed(iso),
            self.0.degenerate_dropped,
        )
    }

    pub(crate) fn bvh(&self) -> &Bvh {
        &self.0.bvh
    }

    /// True when both handles share the same underlying allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::cuboid;
    use approx::assert_relative_eq;

    #[test]
    fn cuboid_attributes() {
        let mesh = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 3.0, 4.0));
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.open_edge_count(), 0);
        assert_eq!(mesh.component_count(), 1);
        assert_relative_eq!(mesh.signed_volume(), 24.0, epsilon = 1e-9);
        assert_relative_eq!(mesh.surface_area(), 52.0, epsilon = 1e-9);
        assert_relative_eq!(mesh.extents().z, 4.0);
    }

    #[test]
    fn welding_merges_shared_corners_and_drops_slivers() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let b_jitter = Point3::new(1.0 + 1e-6, 0.0, 0.0);
        let d = Point3::new(1.0, 1.0, 0.0);
        let soup = vec![[a, b, c], [b_jitter, d, c], [a, a, b]];
        let (mesh, dropped) = TriMesh::from_soup(&soup).unwrap();
        assert_eq!(mesh.vertices().len(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn two_boxes_are_two_components() {
        let left = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let right = cuboid(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0));
        let mut vertices = left.vertices().to_vec();
        let offset = vertices.len() as u32;
        vertices.extend_from_slice(right.vertices());
        let mut faces = left.faces().to_vec();
        faces.extend(right.faces().iter().map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]));
        let handle = MeshHandle::new("pair", TriMesh::new(vertices, faces).unwrap());
        assert!(handle.is_watertight());
        assert_eq!(handle.component_count(), 2);
        assert!(matches!(
            handle.check_integrity(),
            Err(QueryError::MeshIntegrity {
                issue: IntegrityIssue::MultipleComponents { count: 2 },
                ..
            })
        ));
    }

    #[test]
    fn open_mesh_is_not_trusted() {
        let closed = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let mut faces = closed.faces().to_vec();
        faces.pop();
        let handle = MeshHandle::new("open", TriMesh::new(closed.vertices().to_vec(), faces).unwrap());
        assert!(!handle.is_watertight());
        assert!(handle.check_integrity().unwrap_err().is_integrity());
    }

    #[test]
    fn non_finite_corner_survives_stl_and_is_not_trusted() {
        let corner = Point3::new(2.0, 2.0, 2.0);
        let base = cuboid(Point3::new(1.0, 1.0, 1.0), corner);
        let vertices = base
            .vertices()
            .iter()
            .map(|&p| if p == corner { Point3::new(f64::NAN, 2.0, 2.0) } else { p })
            .collect();
        let poisoned = TriMesh::new(vertices, base.faces().to_vec()).unwrap();

        let bytes = crate::stl::write_binary_stl(&poisoned, "poisoned");
        let soup = crate::stl::parse_stl(&bytes).unwrap();
        let (mesh, dropped) = TriMesh::from_soup(&soup).unwrap();
        assert_eq!(dropped, 0);
        // One unwelded copy per incident triangle.
        assert!(mesh.non_finite_count() >= 1);

        let handle = MeshHandle::new("poisoned", mesh);
        assert!(!handle.is_trusted());
        assert!(matches!(
            handle.check_integrity(),
            Err(QueryError::MeshIntegrity {
                issue: IntegrityIssue::NonFinite { .. },
                ..
            })
        ));
        let err = crate::query::signed_distance(&handle, Point3::new(1.5, 1.5, 1.5)).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn infinite_vertex_is_reported_before_topology() {
        let base = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let mut vertices = base.vertices().to_vec();
        vertices[0].z = f64::INFINITY;
        let handle = MeshHandle::new("inf", TriMesh::new(vertices, base.faces().to_vec()).unwrap());
        assert!(matches!(
            handle.check_integrity(),
            Err(QueryError::MeshIntegrity {
                issue: IntegrityIssue::NonFinite { count: 1 },
                ..
            })
        ));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let err = TriMesh::new(vec![Point3::origin()], vec![[0, 1, 2]]).unwrap_err();
        assert!(matches!(err, MeshLoadError::IndexOutOfRange { index: 1, .. }));
    }

    #[test]
    fn surface_samples_respect_spacing_and_are_stable() {
        let mesh = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 1.0, 1.0));
        let coarse = mesh.surface_samples(100.0);
        let fine = mesh.surface_samples(1.0);
        assert_eq!(coarse.len(), 8);
        assert!(fine.len() > coarse.len());
        assert_eq!(fine, mesh.surface_samples(1.0));
    }
}
