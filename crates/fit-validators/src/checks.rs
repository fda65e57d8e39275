//! Check identifiers as they appear in reports.

pub const MESH_INTEGRITY: &str = "mesh_integrity";
pub const EXPORT: &str = "export";
pub const SLOT_AXIS: &str = "slot_axis";
pub const SLOT_DEPTH: &str = "slot_depth";
pub const INSERTION_CORRIDOR: &str = "insertion_corridor";
pub const FRAME_INTERFERENCE: &str = "frame_interference";
pub const FLOOR_CLEARANCE: &str = "floor_clearance";
pub const WALL_THICKNESS: &str = "wall_thickness";
pub const CONTACT_FOOTPRINT: &str = "contact_footprint";
pub const OVERHANG_RISK: &str = "overhang_risk";
/// Sweep-level: a perturbed body differs measurably from its neutral body.
pub const SHAPE_SENSITIVITY: &str = "shape_sensitivity";

/// Failing any of these in any scenario fails the whole sweep.
pub const SWEEP_GATES: [&str; 4] = [INSERTION_CORRIDOR, FRAME_INTERFERENCE, FLOOR_CLEARANCE, SHAPE_SENSITIVITY];

pub fn is_blocking(check_id: &str) -> bool {
    check_id != OVERHANG_RISK
}
