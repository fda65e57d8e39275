//! Closed, outward-oriented fixture solids.
//!
//! These are used by the procedural generator and by tests. Every builder
//! emits a watertight single shell; triangles are oriented against a known
//! outward normal as they are emitted, so callers never have to reason
//! about winding.

use std::f64::consts::{PI, TAU};

use nalgebra::{Point2, Point3, Vector3};

use crate::mesh::TriMesh;

/// Triangle soup collector that fixes winding on push.
#[derive(Debug, Default)]
struct Soup {
    triangles: Vec<[Point3<f64>; 3]>,
}

impl Soup {
    fn push_oriented(&mut self, a: Point3<f64>, b: Point3<f64>, c: Point3<f64>, outward: Vector3<f64>) {
        let normal = (b - a).cross(&(c - a));
        if normal.dot(&outward) < 0.0 {
            self.triangles.push([a, c, b]);
        } else {
            self.triangles.push([a, b, c]);
        }
    }

    fn finish(self) -> TriMesh {
        TriMesh::from_soup(&self.triangles)
            .map(|(mesh, _)| mesh)
            .unwrap_or_else(|_| TriMesh::from_raw(Vec::new(), Vec::new()))
    }
}

/// Axis-aligned box between two corners.
pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> TriMesh {
    let v = |x: bool, y: bool, z: bool| {
        Point3::new(
            if x { max.x } else { min.x },
            if y { max.y } else { min.y },
            if z { max.z } else { min.z },
        )
    };
    let vertices = vec![
        v(false, false, false),
        v(true, false, false),
        v(true, true, false),
        v(false, true, false),
        v(false, false, true),
        v(true, false, true),
        v(true, true, true),
        v(false, true, true),
    ];
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [1, 2, 6],
        [1, 6, 5],
        [2, 3, 7],
        [2, 7, 6],
        [3, 0, 4],
        [3, 4, 7],
    ];
    TriMesh::from_raw(vertices, faces)
}

/// Latitude/longitude sphere.
pub fn uv_sphere(center: Point3<f64>, radius: f64, segments: usize, rings: usize) -> TriMesh {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let at = |ring: usize, seg: usize| {
        let theta = PI * ring as f64 / rings as f64;
        let phi = TAU * (seg % segments) as f64 / segments as f64;
        center + Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()) * radius
    };
    let mut soup = Soup::default();
    for ring in 0..rings {
        for seg in 0..segments {
            let a = at(ring, seg);
            let b = at(ring, seg + 1);
            let c = at(ring + 1, seg);
            let d = at(ring + 1, seg + 1);
            let mid = Point3::from((a.coords + b.coords + c.coords + d.coords) / 4.0);
            let outward = mid - center;
            if ring > 0 {
                soup.push_oriented(a, b, d, outward);
            }
            if ring + 1 < rings {
                soup.push_oriented(a, d, c, outward);
            }
        }
    }
    soup.finish()
}

/// Horizontal outline of a prismatic pocket cut from the top face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PocketOutline {
    /// Regular polygon whose apothem (inscribed radius) is `radius`.
    Round { center: Point2<f64>, radius: f64 },
    Rect { min: Point2<f64>, max: Point2<f64> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pocket {
    pub cell: (usize, usize),
    pub outline: PocketOutline,
    pub floor_z: f64,
}

/// A block whose top face is split into a rectilinear grid of cells, any
/// of which may carry one prismatic pocket.
///
/// Each cell edge is divided into `subdivisions` equal segments, so a
/// round pocket is a regular polygon with `4 * subdivisions` sides whose
/// first vertex points at the cell's lower-left corner.
#[derive(Debug, Clone)]
pub struct PocketedBlock {
    columns: Vec<f64>,
    rows: Vec<f64>,
    top_z: f64,
    bottom_z: f64,
    subdivisions: usize,
    pockets: Vec<Pocket>,
}

impl PocketedBlock {
    /// `columns` and `rows` are ascending grid-line coordinates.
    pub fn new(columns: Vec<f64>, rows: Vec<f64>, bottom_z: f64, top_z: f64) -> Self {
        Self {
            columns,
            rows,
            top_z,
            bottom_z,
            subdivisions: 8,
            pockets: Vec::new(),
        }
    }

    pub fn subdivisions(mut self, n: usize) -> Self {
        self.subdivisions = n.max(1);
        self
    }

    pub fn pocket(mut self, pocket: Pocket) -> Self {
        self.pockets.push(pocket);
        self
    }

    /// Index of the cell containing `(x, y)`, if any.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = self.columns.windows(2).position(|w| x >= w[0] && x <= w[1])?;
        let row = self.rows.windows(2).position(|w| y >= w[0] && y <= w[1])?;
        Some((col, row))
    }

    fn grid_x(&self, col: usize, i: usize) -> f64 {
        let (a, b) = (self.columns[col], self.columns[col + 1]);
        a + (b - a) * (i as f64 / self.subdivisions as f64)
    }

    fn grid_y(&self, row: usize, i: usize) -> f64 {
        let (a, b) = (self.rows[row], self.rows[row + 1]);
        a + (b - a) * (i as f64 / self.subdivisions as f64)
    }

    /// Counter-clockwise cell perimeter starting at the lower-left corner.
    fn perimeter(&self, col: usize, row: usize) -> Vec<Point2<f64>> {
        let m = self.subdivisions;
        let (x0, x1) = (self.columns[col], self.columns[col + 1]);
        let (y0, y1) = (self.rows[row], self.rows[row + 1]);
        let mut pts = Vec::with_capacity(4 * m);
        pts.extend((0..m).map(|i| Point2::new(self.grid_x(col, i), y0)));
        pts.extend((0..m).map(|i| Point2::new(x1, self.grid_y(row, i))));
        pts.extend((0..m).map(|i| Point2::new(self.grid_x(col, m - i), y1)));
        pts.extend((0..m).map(|i| Point2::new(x0, self.grid_y(row, m - i))));
        pts
    }

    fn outline_points(&self, outline: &PocketOutline) -> Vec<Point2<f64>> {
        let m = self.subdivisions;
        let sides = 4 * m;
        match *outline {
            PocketOutline::Round { center, radius } => {
                let circumradius = radius / (PI / sides as f64).cos();
                (0..sides)
                    .map(|k| {
                        let angle = 1.25 * PI + TAU * k as f64 / sides as f64;
                        center + nalgebra::Vector2::new(angle.cos(), angle.sin()) * circumradius
                    })
                    .collect()
            }
            PocketOutline::Rect { min, max } => {
                let lerp = |a: f64, b: f64, i: usize| a + (b - a) * (i as f64 / m as f64);
                let mut pts = Vec::with_capacity(sides);
                pts.extend((0..m).map(|i| Point2::new(lerp(min.x, max.x, i), min.y)));
                pts.extend((0..m).map(|i| Point2::new(max.x, lerp(min.y, max.y, i))));
                pts.extend((0..m).map(|i| Point2::new(lerp(min.x, max.x, m - i), max.y)));
                pts.extend((0..m).map(|i| Point2::new(min.x, lerp(min.y, max.y, m - i))));
                pts
            }
        }
    }

    pub fn build(&self) -> TriMesh {
        let up = Vector3::z();
        let lift = |p: Point2<f64>, z: f64| Point3::new(p.x, p.y, z);
        let mut soup = Soup::default();
        let cols = self.columns.len().saturating_sub(1);
        let rows = self.rows.len().saturating_sub(1);
        if cols == 0 || rows == 0 {
            return soup.finish();
        }

        for row in 0..rows {
            for col in 0..cols {
                let outer = self.perimeter(col, row);
                let n = outer.len();
                match self.pockets.iter().find(|p| p.cell == (col, row)) {
                    None => {
                        let cx = (self.columns[col] + self.columns[col + 1]) * 0.5;
                        let cy = (self.rows[row] + self.rows[row + 1]) * 0.5;
                        let center = Point3::new(cx, cy, self.top_z);
                        for k in 0..n {
                            soup.push_oriented(
                                center,
                                lift(outer[k], self.top_z),
                                lift(outer[(k + 1) % n], self.top_z),
                                up,
                            );
                        }
                    }
                    Some(pocket) => {
                        let inner = self.outline_points(&pocket.outline);
                        let floor = pocket.floor_z;
                        let inner_center = inner
                            .iter()
                            .fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords)
                            / inner.len() as f64;
                        let inner_center = Point2::from(inner_center);
                        for k in 0..n {
                            let k1 = (k + 1) % n;
                            let (o0, o1) = (lift(outer[k], self.top_z), lift(outer[k1], self.top_z));
                            let (i0, i1) = (lift(inner[k], self.top_z), lift(inner[k1], self.top_z));
                            soup.push_oriented(o0, o1, i1, up);
                            soup.push_oriented(o0, i1, i0, up);

                            let (b0, b1) = (lift(inner[k], floor), lift(inner[k1], floor));
                            let mid = nalgebra::center(&inner[k], &inner[k1]);
                            let toward = inner_center - mid;
                            let wall_normal = Vector3::new(toward.x, toward.y, 0.0);
                            soup.push_oriented(i0, i1, b1, wall_normal);
                            soup.push_oriented(i0, b1, b0, wall_normal);

                            soup.push_oriented(lift(inner_center, floor), b0, b1, up);
                        }
                    }
                }
            }
        }

        self.emit_sides(&mut soup);
        soup.finish()
    }

    fn emit_sides(&self, soup: &mut Soup) {
        let m = self.subdivisions;
        let cols = self.columns.len() - 1;
        let rows = self.rows.len() - 1;
        let (x0, x1) = (self.columns[0], self.columns[cols]);
        let (y0, y1) = (self.rows[0], self.rows[rows]);
        let (zb, zt) = (self.bottom_z, self.top_z);

        let xs: Vec<f64> = (0..cols)
            .flat_map(|c| (0..m).map(move |i| (c, i)))
            .map(|(c, i)| self.grid_x(c, i))
            .chain(std::iter::once(x1))
            .collect();
        let ys: Vec<f64> = (0..rows)
            .flat_map(|r| (0..m).map(move |i| (r, i)))
            .map(|(r, i)| self.grid_y(r, i))
            .chain(std::iter::once(y1))
            .collect();

        let mut side = |top: Vec<Point3<f64>>, start: Point3<f64>, end: Point3<f64>, outward: Vector3<f64>| {
            for w in top.windows(2) {
                soup.push_oriented(start, w[0], w[1], outward);
            }
            if let Some(last) = top.last() {
                soup.push_oriented(start, *last, end, outward);
            }
        };

        side(
            xs.iter().map(|&x| Point3::new(x, y0, zt)).collect(),
            Point3::new(x0, y0, zb),
            Point3::new(x1, y0, zb),
            -Vector3::y(),
        );
        side(
            xs.iter().map(|&x| Point3::new(x, y1, zt)).collect(),
            Point3::new(x0, y1, zb),
            Point3::new(x1, y1, zb),
            Vector3::y(),
        );
        side(
            ys.iter().map(|&y| Point3::new(x0, y, zt)).collect(),
            Point3::new(x0, y0, zb),
            Point3::new(x0, y1, zb),
            -Vector3::x(),
        );
        side(
            ys.iter().map(|&y| Point3::new(x1, y, zt)).collect(),
            Point3::new(x1, y0, zb),
            Point3::new(x1, y1, zb),
            Vector3::x(),
        );

        let down = -Vector3::z();
        soup.push_oriented(
            Point3::new(x0, y0, zb),
            Point3::new(x1, y0, zb),
            Point3::new(x1, y1, zb),
            down,
        );
        soup.push_oriented(
            Point3::new(x0, y0, zb),
            Point3::new(x1, y1, zb),
            Point3::new(x0, y1, zb),
            down,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshHandle;
    use crate::query::signed_distance;
    use approx::assert_relative_eq;

    fn bored_block() -> TriMesh {
        PocketedBlock::new(vec![-10.0, 10.0], vec![-10.0, 10.0], -20.0, 0.0)
            .pocket(Pocket {
                cell: (0, 0),
                outline: PocketOutline::Round {
                    center: Point2::new(0.0, 0.0),
                    radius: 3.0,
                },
                floor_z: -8.0,
            })
            .build()
    }

    #[test]
    fn plain_block_is_closed_and_sized() {
        let mesh = PocketedBlock::new(vec![0.0, 2.0, 5.0], vec![0.0, 4.0], -3.0, 0.0)
            .subdivisions(3)
            .build();
        assert_eq!(mesh.open_edge_count(), 0);
        assert_eq!(mesh.component_count(), 1);
        assert_relative_eq!(mesh.signed_volume(), 60.0, epsilon = 1e-9);
    }

    #[test]
    fn pocket_volume_is_subtracted() {
        let mesh = bored_block();
        assert_eq!(mesh.open_edge_count(), 0);
        let sides = 32.0;
        let polygon_area = sides * 3.0 * 3.0 * (PI / sides).tan();
        let expected = 20.0 * 20.0 * 20.0 - polygon_area * 8.0;
        assert_relative_eq!(mesh.signed_volume(), expected, epsilon = 1e-6);
    }

    #[test]
    fn bore_axis_clearance_equals_apothem() {
        let handle = MeshHandle::new("bored", bored_block());
        let d = signed_distance(&handle, Point3::new(0.0, 0.0, -4.0)).unwrap();
        assert_relative_eq!(d, 3.0, epsilon = 1e-9);
        let wall = signed_distance(&handle, Point3::new(5.0, 0.0, -4.0)).unwrap();
        assert!(wall < 0.0);
    }

    #[test]
    fn sphere_is_closed() {
        let mesh = uv_sphere(Point3::origin(), 2.0, 24, 12);
        assert_eq!(mesh.open_edge_count(), 0);
        assert!(mesh.signed_volume() > 0.0);
        assert!(mesh.signed_volume() < 4.0 / 3.0 * PI * 8.0);
    }

    #[test]
    fn cuboid_winds_outward() {
        let mesh = cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert!(mesh.signed_volume() > 0.0);
        for i in 0..mesh.triangle_count() {
            let outward = mesh.face_centroid(i) - Point3::new(0.5, 0.5, 0.5);
            assert!(mesh.face_normal(i).dot(&outward) > 0.0);
        }
    }
}
