//! Named metrics that make up a preset's signature.

use std::collections::BTreeMap;

use fit_types::ScenarioReport;
use fit_validators::checks;
use mesh_query::MeshHandle;

pub const EXTENT_X: &str = "extent_x_mm";
pub const EXTENT_Y: &str = "extent_y_mm";
pub const EXTENT_Z: &str = "extent_z_mm";
pub const VOLUME: &str = "volume_mm3";
pub const SURFACE_AREA: &str = "surface_area_mm2";
pub const FLOOR_CLEARANCE: &str = "floor_clearance_mm";
pub const CORRIDOR_CLEARANCE: &str = "corridor_min_clearance_mm";
pub const FRAME_GAP: &str = "frame_min_gap_mm";

/// Metric name → value, ordered by name.
pub type Signature = BTreeMap<String, f64>;

/// Validator measurements copied into the signature: (check, measured key).
const MEASURED: [(&str, &str); 3] = [
    (checks::FLOOR_CLEARANCE, FLOOR_CLEARANCE),
    (checks::INSERTION_CORRIDOR, CORRIDOR_CLEARANCE),
    (checks::FRAME_INTERFERENCE, FRAME_GAP),
];

/// Volume and area drift in proportion to size; everything else is a length.
pub fn is_relative(metric: &str) -> bool {
    metric == VOLUME || metric == SURFACE_AREA
}

/// Extents, volume and surface area of a body mesh.
pub fn geometry_signature(body: &MeshHandle) -> Signature {
    let mesh = body.mesh();
    let extents = mesh.extents();
    Signature::from([
        (EXTENT_X.to_string(), extents.x),
        (EXTENT_Y.to_string(), extents.y),
        (EXTENT_Z.to_string(), extents.z),
        (VOLUME.to_string(), mesh.volume()),
        (SURFACE_AREA.to_string(), mesh.surface_area()),
    ])
}

/// Geometry signature plus the fit measurements the scenario produced.
///
/// A check that could not measure (integrity failure, no valid probes)
/// leaves its metric out, which the drift comparison reports as missing.
pub fn signature_metrics(body: &MeshHandle, report: &ScenarioReport) -> Signature {
    let mut signature = geometry_signature(body);
    for (check_id, key) in MEASURED {
        let value = report
            .result(check_id)
            .and_then(|r| r.measured.get(key))
            .copied()
            .filter(|v| v.is_finite());
        if let Some(v) = value {
            signature.insert(key.to_string(), v);
        }
    }
    signature
}
