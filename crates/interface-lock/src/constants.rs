use std::fmt;

use serde::{Deserialize, Serialize};

/// Tolerance for comparing live constants against canonical values.
pub const LOCK_TOLERANCE: f64 = 1e-6;

/// Target depth from slot entry to ball seat.
pub const TARGET_SLOT_DEPTH: f64 = 7.0;

/// Target radial clearance between slot and ball.
pub const TARGET_RADIAL_CLEARANCE: f64 = 0.125;

/// One locked interface constant. Values in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LockKey {
    PivotY,
    PivotZ,
    SlotDiameter,
    BallDiameter,
    SlotEntryZ,
    FrameSpacing,
    FrameBottomZ,
    CoordinateRimZ,
    ModelRimZ,
}

impl LockKey {
    pub const ALL: [LockKey; 9] = [
        LockKey::PivotY,
        LockKey::PivotZ,
        LockKey::SlotDiameter,
        LockKey::BallDiameter,
        LockKey::SlotEntryZ,
        LockKey::FrameSpacing,
        LockKey::FrameBottomZ,
        LockKey::CoordinateRimZ,
        LockKey::ModelRimZ,
    ];

    /// Name as it appears in the constants source.
    pub const fn name(self) -> &'static str {
        match self {
            LockKey::PivotY => "REFERENCE_PIVOT_Y",
            LockKey::PivotZ => "REFERENCE_PIVOT_Z",
            LockKey::SlotDiameter => "REFERENCE_SLOT_DIAMETER",
            LockKey::BallDiameter => "REFERENCE_BALL_DIAMETER",
            LockKey::SlotEntryZ => "REFERENCE_SLOT_ENTRY_Z",
            LockKey::FrameSpacing => "REFERENCE_FRAME_SPACING",
            LockKey::FrameBottomZ => "REFERENCE_FRAME_BOTTOM_Z",
            LockKey::CoordinateRimZ => "REFERENCE_COORDINATE_RIM_Z",
            LockKey::ModelRimZ => "REFERENCE_MODEL_RIM_Z",
        }
    }

    pub const fn canonical(self) -> f64 {
        match self {
            LockKey::PivotY => 33.0,
            LockKey::PivotZ => 38.0,
            LockKey::SlotDiameter => 7.5,
            LockKey::BallDiameter => 7.25,
            LockKey::SlotEntryZ => 45.0,
            LockKey::FrameSpacing => 16.0,
            LockKey::FrameBottomZ => 17.0,
            LockKey::CoordinateRimZ => 45.0,
            LockKey::ModelRimZ => 0.0,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
