//! Deterministic in-process fixtures.
//!
//! The body is a pocketed block: four round bores receive the mating balls
//! and two rectangular trenches give the frames room to swing. Parameters
//! come from a named preset plus scenario overrides, exactly as a CAD
//! wrapper would apply them.

use std::collections::BTreeMap;
use std::path::Path;

use fit_types::{ParamValue, PartKind};
use mesh_query::primitives::{cuboid, uv_sphere, Pocket, PocketOutline, PocketedBlock};
use mesh_query::{stl, TriMesh};
use nalgebra::{Point2, Point3};
use tracing::debug;

use crate::error::ExportError;
use crate::generator::{ExportRequest, GeometryGenerator};

/// Body parameters, in millimetres unless noted.
#[derive(Debug, Clone, PartialEq)]
struct BodyParams {
    slot_spacing_x_mm: f64,
    slot_spacing_y_mm: f64,
    slot_diameter_mm: f64,
    seat_z_mm: f64,
    cavity_depth_mm: f64,
    trench_half_width_mm: f64,
    trench_half_length_mm: f64,
    block_height_mm: f64,
    bore_offset_x_mm: f64,
    omit_bottom: bool,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            slot_spacing_x_mm: 16.0,
            slot_spacing_y_mm: 33.0,
            slot_diameter_mm: 7.5,
            seat_z_mm: -7.0,
            cavity_depth_mm: 32.0,
            trench_half_width_mm: 10.0,
            trench_half_length_mm: 20.0,
            block_height_mm: 40.0,
            bore_offset_x_mm: 0.0,
            omit_bottom: false,
        }
    }
}

impl BodyParams {
    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ExportError> {
        let v = value.as_f64();
        match name {
            "slot_spacing_x_mm" => self.slot_spacing_x_mm = v,
            "slot_spacing_y_mm" => self.slot_spacing_y_mm = v,
            "slot_diameter_mm" => self.slot_diameter_mm = v,
            "seat_z_mm" => self.seat_z_mm = v,
            "cavity_depth_mm" => self.cavity_depth_mm = v,
            "trench_half_width_mm" => self.trench_half_width_mm = v,
            "trench_half_length_mm" => self.trench_half_length_mm = v,
            "block_height_mm" => self.block_height_mm = v,
            "bore_offset_x_mm" => self.bore_offset_x_mm = v,
            "omit_bottom" => self.omit_bottom = value.as_bool(),
            other => {
                return Err(ExportError::InvalidRequest(format!(
                    "unknown body parameter `{other}`"
                )))
            }
        }
        Ok(())
    }

    fn build(&self) -> Result<TriMesh, ExportError> {
        let invalid = |msg: String| Err(ExportError::InvalidRequest(msg));
        let sx = self.slot_spacing_x_mm;
        let sy = self.slot_spacing_y_mm;
        let tl = self.trench_half_length_mm;
        let radius = self.slot_diameter_mm / 2.0;
        let bottom = -self.block_height_mm;

        if !(radius > 0.0) || !(self.cavity_depth_mm > 0.0) || !(self.block_height_mm > self.cavity_depth_mm) {
            return invalid(format!("inconsistent body parameters: {self:?}"));
        }

        let columns = vec![-(sx + 18.0), -(sx + 12.0), -4.0, 4.0, sx + 12.0, sx + 18.0];
        let rows = vec![-(sy + 18.0), -(sy + 12.0), -(tl + 1.0), tl + 1.0, sy + 12.0, sy + 18.0];
        if columns.windows(2).chain(rows.windows(2)).any(|w| !(w[0] < w[1])) {
            return invalid(format!("grid lines out of order: {columns:?} / {rows:?}"));
        }
        let mut block = PocketedBlock::new(columns.clone(), rows.clone(), bottom, 0.0);

        let inside_cell = |cell: (usize, usize), min: Point2<f64>, max: Point2<f64>| {
            min.x > columns[cell.0] && max.x < columns[cell.0 + 1] && min.y > rows[cell.1] && max.y < rows[cell.1 + 1]
        };

        let floor_z = self.seat_z_mm - radius;
        if !(floor_z > bottom) {
            return invalid(format!("bore floor {floor_z} below block bottom {bottom}"));
        }
        for x_sign in [-1.0, 1.0] {
            for y_sign in [-1.0, 1.0] {
                let center = Point2::new(x_sign * sx + self.bore_offset_x_mm, y_sign * sy);
                let extent = nalgebra::Vector2::new(radius, radius) * 1.05;
                let cell = block.cell_at(center.x, center.y).filter(|&c| inside_cell(c, center - extent, center + extent));
                let Some(cell) = cell else {
                    return invalid(format!("bore at ({}, {}) does not fit its cell", center.x, center.y));
                };
                block = block.pocket(Pocket {
                    cell,
                    outline: PocketOutline::Round { center, radius },
                    floor_z,
                });
            }
        }

        let hw = self.trench_half_width_mm;
        for x_sign in [-1.0, 1.0] {
            let min = Point2::new(x_sign * sx - hw, -tl);
            let max = Point2::new(x_sign * sx + hw, tl);
            let cell = block.cell_at(x_sign * sx, 0.0).filter(|&c| inside_cell(c, min, max));
            let Some(cell) = cell else {
                return invalid(format!("trench of half width {hw} does not fit its cell"));
            };
            block = block.pocket(Pocket {
                cell,
                outline: PocketOutline::Rect { min, max },
                floor_z: -self.cavity_depth_mm,
            });
        }

        let mesh = block.build();
        if !self.omit_bottom {
            return Ok(mesh);
        }
        let faces = (0..mesh.triangle_count())
            .filter(|&i| !(mesh.face_normal(i).z < -0.5 && (mesh.face_centroid(i).z - bottom).abs() < 1e-9))
            .map(|i| mesh.faces()[i])
            .collect();
        Ok(TriMesh::new(mesh.vertices().to_vec(), faces)?)
    }
}

/// Frame plate in the mating part's coordinate frame: hangs from the pivot
/// height down to the frame bottom.
fn frame_mesh() -> TriMesh {
    cuboid(Point3::new(-1.0, -18.0, 17.0), Point3::new(1.0, 18.0, 38.0))
}

fn plug_mesh() -> TriMesh {
    uv_sphere(Point3::origin(), 3.625, 32, 16)
}

/// Generator backed by the built-in fixture geometry.
#[derive(Debug, Clone)]
pub struct ProceduralGenerator {
    presets: BTreeMap<String, BTreeMap<String, ParamValue>>,
}

impl Default for ProceduralGenerator {
    fn default() -> Self {
        let mut presets = BTreeMap::new();
        presets.insert("default".to_string(), BTreeMap::new());
        presets.insert(
            "deep_floor".to_string(),
            BTreeMap::from([("cavity_depth_mm".to_string(), ParamValue::Float(34.0))]),
        );
        presets.insert(
            "wide_trench".to_string(),
            BTreeMap::from([("trench_half_width_mm".to_string(), ParamValue::Float(11.0))]),
        );
        Self { presets }
    }
}

impl ProceduralGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a preset.
    pub fn with_preset(mut self, name: impl Into<String>, params: BTreeMap<String, ParamValue>) -> Self {
        self.presets.insert(name.into(), params);
        self
    }

    pub fn preset_names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    /// Build a part in memory without touching the filesystem.
    pub fn build(&self, request: &ExportRequest) -> Result<TriMesh, ExportError> {
        match (request.part, &request.scenario) {
            (PartKind::Frame, _) => Ok(frame_mesh()),
            (PartKind::Plug, _) => Ok(plug_mesh()),
            (PartKind::Body, None) => Err(ExportError::InvalidRequest(
                "body export needs a scenario".to_string(),
            )),
            (PartKind::Body, Some(scenario)) => {
                let preset = self
                    .presets
                    .get(scenario.preset())
                    .ok_or_else(|| ExportError::UnknownPreset(scenario.preset().to_string()))?;
                let mut params = BodyParams::default();
                for (name, value) in preset.iter().chain(scenario.overrides()) {
                    params.set(name, *value)?;
                }
                params.build()
            }
        }
    }
}

impl GeometryGenerator for ProceduralGenerator {
    fn fingerprint(&self) -> String {
        let table = fit_types::canonical_hash(&self.presets).unwrap_or_default();
        fit_types::hash_parts(["procedural-v1", table.as_str()])
    }

    fn generate(&self, request: &ExportRequest, output: &Path) -> Result<(), ExportError> {
        let mesh = self.build(request)?;
        debug!(part = %request.part, triangles = mesh.triangle_count(), "procedural export");
        stl::save_stl(output, &mesh, request.part.as_str())?;
        Ok(())
    }

    fn has_preset(&self, preset: &str) -> bool {
        self.presets.contains_key(preset)
    }
}
