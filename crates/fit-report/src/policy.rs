//! `overall_pass = all_scenarios_pass AND no_unresolved_drift`.

use golden_signature::{DriftReport, OverrideSource};
use serde::{Deserialize, Serialize};
use sweep_engine::{GateFailure, SweepOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySection {
    pub all_scenarios_pass: bool,
    /// Designated sweep gates that failed, by scenario.
    pub gate_failures: Vec<GateFailure>,
    /// Scenarios skipped after a fail-fast stop.
    pub not_run: Vec<String>,
    pub drift_detected: bool,
    pub no_unresolved_drift: bool,
    pub override_source: OverrideSource,
    /// Drift was present and the override absorbed it.
    pub override_used: bool,
    pub overall_pass: bool,
}

pub fn evaluate_policy(outcome: &SweepOutcome, drift: &DriftReport) -> PolicySection {
    let all_scenarios_pass = outcome.all_pass();
    let no_unresolved_drift = !drift.blocking;
    PolicySection {
        all_scenarios_pass,
        gate_failures: outcome.gate_failures(),
        not_run: outcome.not_run.clone(),
        drift_detected: drift.drift_detected(),
        no_unresolved_drift,
        override_source: drift.override_source,
        override_used: drift.override_used(),
        overall_pass: all_scenarios_pass && no_unresolved_drift,
    }
}
