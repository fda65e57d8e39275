//! Model-space positions derived from the lock.
//!
//! The lock is published in the mating part's coordinate frame, whose rim
//! sits at `REFERENCE_COORDINATE_RIM_Z`. The validated part is modelled with
//! its rim at `REFERENCE_MODEL_RIM_Z`, so every height is shifted by
//! `model_rim_z - coordinate_rim_z` before use.

use nalgebra::{Isometry3, Point2, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::constants::LockKey;
use crate::lock::InterfaceLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitGeometry {
    /// Slot axes in plan, ordered (-x,-y), (-x,+y), (+x,-y), (+x,+y).
    pub slot_axes: Vec<Point2<f64>>,
    pub slot_diameter: f64,
    pub ball_diameter: f64,
    /// Ball seat height in model space.
    pub seat_z: f64,
    /// Slot entry height in model space.
    pub entry_z: f64,
    /// Frame placements along x, in sampling order.
    pub frame_placements: Vec<f64>,
    /// Vertical shift applied to the frame mesh before posing.
    pub frame_alignment_z: f64,
    /// Unit direction of the swing axis.
    pub pivot_direction: Vector3<f64>,
}

impl FitGeometry {
    pub fn from_lock(lock: &InterfaceLock) -> Self {
        let spacing = lock.get(LockKey::FrameSpacing);
        let pivot_y = lock.get(LockKey::PivotY);
        let coord_rim = lock.get(LockKey::CoordinateRimZ);
        let model_rim = lock.get(LockKey::ModelRimZ);

        let mut slot_axes = Vec::with_capacity(4);
        for x_sign in [-1.0, 1.0] {
            for y_sign in [-1.0, 1.0] {
                slot_axes.push(Point2::new(x_sign * spacing, y_sign * pivot_y));
            }
        }

        Self {
            slot_axes,
            slot_diameter: lock.get(LockKey::SlotDiameter),
            ball_diameter: lock.get(LockKey::BallDiameter),
            seat_z: lock.get(LockKey::PivotZ) - coord_rim + model_rim,
            entry_z: lock.get(LockKey::SlotEntryZ) - coord_rim + model_rim,
            frame_placements: vec![-spacing, spacing],
            frame_alignment_z: model_rim - coord_rim,
            pivot_direction: Vector3::y(),
        }
    }

    /// Same geometry with a different mating ball.
    pub fn with_ball_diameter(mut self, diameter: f64) -> Self {
        self.ball_diameter = diameter;
        self
    }

    pub fn ball_radius(&self) -> f64 {
        self.ball_diameter / 2.0
    }

    pub fn slot_radius(&self) -> f64 {
        self.slot_diameter / 2.0
    }

    pub fn slot_depth(&self) -> f64 {
        self.entry_z - self.seat_z
    }

    pub fn target_radial_clearance(&self) -> f64 {
        (self.slot_diameter - self.ball_diameter) / 2.0
    }

    /// Pivot point of the frame placed at `placement_x`.
    pub fn pivot_point(&self, placement_x: f64) -> Point3<f64> {
        Point3::new(placement_x, 0.0, self.seat_z)
    }

    /// Resting pose of the frame mesh at a placement.
    pub fn frame_rest(&self, placement_x: f64) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(placement_x, 0.0, self.frame_alignment_z),
            UnitQuaternion::identity(),
        )
    }

    /// Frame pose swung by `angle_deg` about the pivot axis.
    pub fn frame_pose(&self, placement_x: f64, angle_deg: f64) -> Isometry3<f64> {
        let axis = nalgebra::Unit::new_normalize(self.pivot_direction);
        let rotation = UnitQuaternion::from_axis_angle(&axis, angle_deg.to_radians());
        Isometry3::rotation_wrt_point(rotation, self.pivot_point(placement_x))
            * self.frame_rest(placement_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn canonical_model_space_heights() {
        let g = InterfaceLock::canonical().fit_geometry();
        assert_eq!(g.seat_z, -7.0);
        assert_eq!(g.entry_z, 0.0);
        assert_eq!(g.frame_alignment_z, -45.0);
        assert_eq!(g.slot_depth(), 7.0);
        assert_eq!(g.target_radial_clearance(), 0.125);
        assert_eq!(g.slot_axes[1], Point2::new(-16.0, 33.0));
    }

    #[test]
    fn zero_angle_pose_is_rest() {
        let g = InterfaceLock::canonical().fit_geometry();
        let p = Point3::new(0.5, 3.0, 20.0);
        assert_relative_eq!(g.frame_pose(16.0, 0.0) * p, g.frame_rest(16.0) * p, epsilon = 1e-12);
    }

    #[test]
    fn pose_keeps_pivot_fixed() {
        let g = InterfaceLock::canonical().fit_geometry();
        // A frame-space point that rests exactly on the pivot.
        let on_pivot = Point3::new(0.0, 0.0, 38.0);
        for angle in [-24.0, -3.0, 12.0, 24.0] {
            assert_relative_eq!(
                g.frame_pose(-16.0, angle) * on_pivot,
                g.pivot_point(-16.0),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn larger_ball_flips_clearance_sign() {
        let g = InterfaceLock::canonical().fit_geometry().with_ball_diameter(7.6);
        assert!(g.target_radial_clearance() < 0.0);
    }
}
