//! Bounding volume hierarchy over mesh triangles.
//!
//! Nodes are stored flat; leaves reference a contiguous range of the
//! reordered triangle list. The build is fully deterministic (median split
//! on the longest axis, ties broken by triangle index) so traversal order,
//! and therefore every tie-break in the queries built on top, is stable
//! across runs.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

const MAX_LEAF: usize = 4;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// An inverted box that any `expand` call replaces.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.expand_point(p);
        }
        bbox
    }

    pub fn expand_point(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn expand(&mut self, other: &Self) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn extents(&self) -> Vector3<f64> {
        if self.is_valid() {
            self.max - self.min
        } else {
            Vector3::zeros()
        }
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn diagonal(&self) -> f64 {
        self.extents().norm()
    }

    fn longest_axis(&self) -> usize {
        let e = self.extents();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }

    /// Squared distance from `p` to the box (zero inside).
    pub fn distance_squared(&self, p: &Point3<f64>) -> f64 {
        let mut d2 = 0.0;
        for axis in 0..3 {
            let v = p[axis];
            if v < self.min[axis] {
                d2 += (self.min[axis] - v).powi(2);
            } else if v > self.max[axis] {
                d2 += (v - self.max[axis]).powi(2);
            }
        }
        d2
    }

    /// Slab test: does the ray `origin + t * dir`, `t` in `[0, max_t]`,
    /// touch the box?
    pub fn ray_overlaps(&self, origin: &Point3<f64>, dir: &Vector3<f64>, max_t: f64) -> bool {
        let mut t0 = 0.0_f64;
        let mut t1 = max_t;
        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            if d.abs() < 1e-300 {
                if o < self.min[axis] || o > self.max[axis] {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut near = (self.min[axis] - o) * inv;
            let mut far = (self.max[axis] - o) * inv;
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            t0 = t0.max(near);
            t1 = t1.min(far);
            if t0 > t1 {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
struct Node {
    bbox: Aabb,
    /// Leaf: first index into `order`. Internal: index of the left child.
    first: u32,
    /// Leaf: triangle count. Internal: 0.
    count: u32,
    /// Internal only.
    right: u32,
}

/// Triangle hierarchy built once per mesh.
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<Node>,
    order: Vec<u32>,
}

impl Bvh {
    pub fn build(vertices: &[Point3<f64>], faces: &[[u32; 3]]) -> Self {
        let boxes: Vec<Aabb> = faces
            .iter()
            .map(|f| Aabb::from_points(f.iter().map(|&i| &vertices[i as usize])))
            .collect();
        let mut order: Vec<u32> = (0..faces.len() as u32).collect();
        let mut nodes = Vec::with_capacity(faces.len().max(1) * 2 / MAX_LEAF + 1);
        if !faces.is_empty() {
            Self::build_node(&boxes, &mut order, 0, faces.len(), &mut nodes);
        }
        Self { nodes, order }
    }

    fn build_node(
        boxes: &[Aabb],
        order: &mut [u32],
        start: usize,
        end: usize,
        nodes: &mut Vec<Node>,
    ) -> u32 {
        let mut bbox = Aabb::empty();
        for &t in &order[start..end] {
            bbox.expand(&boxes[t as usize]);
        }
        let index = nodes.len() as u32;
        nodes.push(Node {
            bbox,
            first: start as u32,
            count: (end - start) as u32,
            right: 0,
        });
        if end - start <= MAX_LEAF {
            return index;
        }

        let axis = bbox.longest_axis();
        order[start..end].sort_by(|&a, &b| {
            let ca = boxes[a as usize].center()[axis];
            let cb = boxes[b as usize].center()[axis];
            ca.total_cmp(&cb).then(a.cmp(&b))
        });
        let mid = start + (end - start) / 2;
        let left = Self::build_node(boxes, order, start, mid, nodes);
        let right = Self::build_node(boxes, order, mid, end, nodes);
        let node = &mut nodes[index as usize];
        node.first = left;
        node.count = 0;
        node.right = right;
        index
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Branch-and-bound nearest search.
    ///
    /// `eval(tri)` returns the squared distance from the query point to
    /// triangle `tri` plus any payload. Among equal distances the lowest
    /// triangle index wins.
    pub fn nearest<T>(
        &self,
        point: &Point3<f64>,
        mut eval: impl FnMut(u32) -> (f64, T),
    ) -> Option<(u32, f64, T)> {
        let mut best: Option<(u32, f64, T)> = None;
        if self.nodes.is_empty() {
            return None;
        }
        let mut stack = vec![0u32];
        while let Some(n) = stack.pop() {
            let node = &self.nodes[n as usize];
            let bound = node.bbox.distance_squared(point);
            if let Some((_, d2, _)) = &best {
                if bound > *d2 {
                    continue;
                }
            }
            if node.count > 0 {
                let range = node.first as usize..(node.first + node.count) as usize;
                for &tri in &self.order[range] {
                    let (d2, payload) = eval(tri);
                    let better = match &best {
                        None => true,
                        Some((bt, bd2, _)) => d2 < *bd2 || (d2 == *bd2 && tri < *bt),
                    };
                    if better {
                        best = Some((tri, d2, payload));
                    }
                }
            } else {
                let left = node.first;
                let right = node.right;
                let dl = self.nodes[left as usize].bbox.distance_squared(point);
                let dr = self.nodes[right as usize].bbox.distance_squared(point);
                // Push the farther child first so the nearer one is explored first.
                if dl <= dr {
                    stack.push(right);
                    stack.push(left);
                } else {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        best
    }

    /// Every triangle whose box the ray segment touches, in ascending index order.
    pub fn ray_candidates(&self, origin: &Point3<f64>, dir: &Vector3<f64>, max_t: f64) -> Vec<u32> {
        let mut out = Vec::new();
        if self.nodes.is_empty() {
            return out;
        }
        let mut stack = vec![0u32];
        while let Some(n) = stack.pop() {
            let node = &self.nodes[n as usize];
            if !node.bbox.ray_overlaps(origin, dir, max_t) {
                continue;
            }
            if node.count > 0 {
                let range = node.first as usize..(node.first + node.count) as usize;
                out.extend_from_slice(&self.order[range]);
            } else {
                stack.push(node.right);
                stack.push(node.first);
            }
        }
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_triangles(n: usize) -> (Vec<Point3<f64>>, Vec<[u32; 3]>) {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        for i in 0..n {
            let x = i as f64 * 2.0;
            let base = vertices.len() as u32;
            vertices.push(Point3::new(x, 0.0, 0.0));
            vertices.push(Point3::new(x + 1.0, 0.0, 0.0));
            vertices.push(Point3::new(x, 1.0, 0.0));
            faces.push([base, base + 1, base + 2]);
        }
        (vertices, faces)
    }

    #[test]
    fn nearest_matches_brute_force() {
        let (vertices, faces) = grid_triangles(40);
        let bvh = Bvh::build(&vertices, &faces);
        let query = Point3::new(37.3, 0.2, 1.0);
        let dist = |tri: u32| {
            let c = Aabb::from_points(faces[tri as usize].iter().map(|&i| &vertices[i as usize]));
            (c.distance_squared(&query), ())
        };
        let (tri, _, _) = bvh.nearest(&query, dist).expect("non-empty");
        let brute = (0..faces.len() as u32)
            .min_by(|&a, &b| dist(a).0.total_cmp(&dist(b).0).then(a.cmp(&b)))
            .expect("non-empty");
        assert_eq!(tri, brute);
    }

    #[test]
    fn ray_candidates_prune_far_boxes() {
        let (vertices, faces) = grid_triangles(40);
        let bvh = Bvh::build(&vertices, &faces);
        let hits = bvh.ray_candidates(&Point3::new(10.5, 0.25, 5.0), &-Vector3::z(), 10.0);
        assert!(hits.contains(&5));
        assert!(hits.len() < faces.len());
    }

    #[test]
    fn slab_test_handles_axis_parallel_rays() {
        let bbox = Aabb {
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(1.0, 1.0, 1.0),
        };
        assert!(bbox.ray_overlaps(&Point3::new(0.5, 0.5, 3.0), &-Vector3::z(), 10.0));
        assert!(!bbox.ray_overlaps(&Point3::new(1.5, 0.5, 3.0), &-Vector3::z(), 10.0));
        assert!(!bbox.ray_overlaps(&Point3::new(0.5, 0.5, 3.0), &-Vector3::z(), 1.0));
    }
}
