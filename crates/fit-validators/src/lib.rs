//! Fit validators: pure functions from meshes, locked geometry and limits
//! to [`ValidationResult`]s.
//!
//! Each check measures everything it samples before judging, so a failing
//! result still carries its worst value. A mesh that cannot be trusted
//! yields an integrity failure for the checks that needed it, never a
//! number.

pub mod checks;
pub mod config;
pub mod corridor;
pub mod floor;
pub mod integrity;
pub mod kinematics;
pub mod manufacturability;
pub mod slot;

pub use config::{ConfigError, FitThresholds, FitThresholdsBuilder, SamplingConfig};

use fit_types::ValidationResult;
use interface_lock::FitGeometry;
use mesh_query::{MeshHandle, QueryError};
use tracing::{info, instrument};

/// The three meshes of one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioParts {
    pub body: MeshHandle,
    pub frame: MeshHandle,
    pub plug: MeshHandle,
}

/// Convert a query outcome into a result for `check_id`.
pub fn settle(check_id: &str, outcome: Result<ValidationResult, QueryError>) -> ValidationResult {
    match outcome {
        Ok(result) => result,
        Err(e) if e.is_integrity() => ValidationResult::integrity_failure(check_id, e.to_string()),
        Err(e) => ValidationResult::fail(check_id, e.to_string()),
    }
}

/// `f64::min` that keeps NaN, so a poisoned sample fails its check
/// instead of being skipped.
pub(crate) fn min_keep_nan(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

/// Every validator, configured once.
#[derive(Debug, Clone)]
pub struct FitSuite {
    geometry: FitGeometry,
    sampling: SamplingConfig,
    thresholds: FitThresholds,
}

impl FitSuite {
    pub fn new(
        geometry: FitGeometry,
        sampling: SamplingConfig,
        thresholds: FitThresholds,
    ) -> Result<Self, ConfigError> {
        sampling.validate()?;
        Ok(Self {
            geometry,
            sampling,
            thresholds,
        })
    }

    pub fn geometry(&self) -> &FitGeometry {
        &self.geometry
    }

    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    pub fn thresholds(&self) -> &FitThresholds {
        &self.thresholds
    }

    /// Run every check in a fixed order.
    #[instrument(skip_all, fields(body = parts.body.label()))]
    pub fn run(&self, parts: &ScenarioParts) -> Vec<ValidationResult> {
        let (g, s, t) = (&self.geometry, &self.sampling, &self.thresholds);
        let body = &parts.body;
        let mut results = vec![integrity::validate(&[
            ("body", body),
            ("frame", &parts.frame),
            ("plug", &parts.plug),
        ])];

        // The corridor follows the axes actually found in the body.
        let located = slot::locate_axes(body, g, s);
        let axes = match &located {
            Ok(fixes) => fixes.iter().map(|f| f.observed).collect(),
            Err(_) => g.slot_axes.clone(),
        };
        results.push(settle(
            checks::SLOT_AXIS,
            located.and_then(|fixes| slot::judge_axes(&fixes, body, g, s, t)),
        ));
        results.push(slot::validate_depth(g, t));
        results.push(settle(
            checks::INSERTION_CORRIDOR,
            corridor::validate(body, g, &axes, s, t),
        ));
        results.push(settle(
            checks::FRAME_INTERFERENCE,
            kinematics::validate(body, &parts.frame, g, s, t),
        ));
        results.push(settle(
            checks::FLOOR_CLEARANCE,
            floor::validate(body, &parts.frame, g, s, t),
        ));
        results.push(settle(
            checks::WALL_THICKNESS,
            manufacturability::wall_thickness(body, s, t),
        ));
        results.push(settle(
            checks::CONTACT_FOOTPRINT,
            manufacturability::contact_footprint(body, s, t),
        ));
        results.push(settle(
            checks::OVERHANG_RISK,
            manufacturability::overhang_risk(body, s, t),
        ));
        for result in &mut results {
            if !checks::is_blocking(&result.check_id) {
                result.blocking = false;
            }
        }

        let failed: Vec<&str> = results
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| r.check_id.as_str())
            .collect();
        info!(checks = results.len(), ?failed, "fit suite finished");
        results
    }
}
