use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fit_types::ScenarioReport;
use fit_validators::{FitThresholds, SamplingConfig};
use golden_signature::DriftReport;
use mesh_export::ExportRecord;
use serde::Serialize;
use sweep_engine::{SweepOutcome, SweepProfile};
use tracing::info;
use uuid::Uuid;

use crate::error::ReportError;
use crate::policy::{evaluate_policy, PolicySection};

pub const SCHEMA_VERSION: &str = "1.0";

/// What the run validated, with enough identity for a consumer to decide
/// whether the report still describes the tree in front of it.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    pub source_root: PathBuf,
    pub source_fingerprint: String,
    /// Files and directories covered by `inputs_hash`, relative to the root.
    pub inputs: Vec<PathBuf>,
    pub inputs_hash: String,
    pub generator: String,
    pub tool_version: String,
    pub lock_values: BTreeMap<String, f64>,
    pub lock_fingerprint: String,
    pub thresholds: FitThresholds,
    pub sampling: SamplingConfig,
    pub sweep_profile: SweepProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullValidationReport {
    pub schema_version: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub provenance: Provenance,
    pub scenarios: Vec<ScenarioReport>,
    pub exports: Vec<ExportRecord>,
    pub drift: DriftReport,
    pub policy: PolicySection,
    pub overall_pass: bool,
}

impl FullValidationReport {
    pub fn new(provenance: Provenance, outcome: SweepOutcome, drift: DriftReport) -> Self {
        let policy = evaluate_policy(&outcome, &drift);
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            provenance,
            scenarios: outcome.scenarios,
            exports: outcome.exports,
            drift,
            overall_pass: policy.overall_pass,
            policy,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write through a sibling temp file so readers never see a partial report.
    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ReportError::io(parent, e))?;
        }
        let json = self.to_json().map_err(|source| ReportError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let mut staging = path.as_os_str().to_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        fs::write(&staging, json).map_err(|e| ReportError::io(&staging, e))?;
        fs::rename(&staging, path).map_err(|e| ReportError::io(path, e))?;
        info!(path = %path.display(), run_id = %self.run_id, overall_pass = self.overall_pass, "report written");
        Ok(())
    }
}
