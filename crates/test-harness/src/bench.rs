//! Fluent sweep builder over the procedural fixture.
//!
//! ```ignore
//! let run = FitBench::new()
//!     .presets(["default"])
//!     .perturb("thin_floor", [("cavity_depth_mm", 29.0)])
//!     .run()?;
//! let floor = run.measured("default:perturb:thin_floor", checks::FLOOR_CLEARANCE, "floor_clearance_mm")?;
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use fit_report::{evaluate_policy, PolicySection};
use fit_types::{ParamValue, ScenarioReport, ValidationResult};
use fit_validators::{FitSuite, FitThresholds, FitThresholdsBuilder, SamplingConfig};
use golden_signature::{
    commit_baseline, compare, BaselineFile, DriftOverride, DriftReport, Provenance, ToleranceBands,
};
use interface_lock::{InterfaceLock, LockKey};
use mesh_export::{ExportCache, ProceduralGenerator};
use sweep_engine::{Orchestrator, Perturbation, SweepOptions, SweepOutcome, SweepProfile};
use tempfile::TempDir;

use crate::error::HarnessError;

/// Sweep configuration against an isolated cache directory.
///
/// Every `run` gets its own temporary directory, so benches never share
/// artifacts unless [`BenchRun::rerun`] is used.
#[derive(Debug, Clone)]
pub struct FitBench {
    generator: ProceduralGenerator,
    lock_values: BTreeMap<String, f64>,
    ball_diameter: Option<f64>,
    thresholds: FitThresholdsBuilder,
    sampling: SamplingConfig,
    presets: Vec<String>,
    perturbations: Vec<Perturbation>,
    options: SweepOptions,
}

impl Default for FitBench {
    fn default() -> Self {
        Self {
            generator: ProceduralGenerator::new(),
            lock_values: InterfaceLock::canonical().named_values(),
            ball_diameter: None,
            thresholds: FitThresholds::builder(),
            sampling: SamplingConfig::quick(),
            presets: vec!["default".to_string()],
            perturbations: Vec::new(),
            options: SweepOptions::default().with_jobs(2),
        }
    }
}

impl FitBench {
    /// Canonical lock, default thresholds, quick sampling, `default` preset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fixture preset.
    pub fn with_preset<'a>(mut self, name: &str, params: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        let params = params
            .into_iter()
            .map(|(k, v)| (k.to_string(), ParamValue::Float(v)))
            .collect();
        self.generator = self.generator.with_preset(name, params);
        self
    }

    /// Replace one published lock constant.
    pub fn with_lock_value(mut self, key: LockKey, value: f64) -> Self {
        self.lock_values.insert(key.name().to_string(), value);
        self
    }

    /// Validate against a different mating ball without touching the lock.
    pub fn with_ball_diameter(mut self, diameter: f64) -> Self {
        self.ball_diameter = Some(diameter);
        self
    }

    /// Adjust thresholds; validated when the bench runs.
    pub fn with_thresholds(mut self, f: impl FnOnce(FitThresholdsBuilder) -> FitThresholdsBuilder) -> Self {
        self.thresholds = f(self.thresholds);
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn presets<I, S>(mut self, presets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.presets = presets.into_iter().map(Into::into).collect();
        self
    }

    /// Add a perturbation applied to every preset.
    pub fn perturb<'a>(mut self, name: &str, overrides: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        self.perturbations.push(Perturbation {
            name: name.to_string(),
            overrides: overrides
                .into_iter()
                .map(|(k, v)| (k.to_string(), ParamValue::Float(v)))
                .collect(),
        });
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.options = self.options.with_jobs(jobs);
        self
    }

    pub fn fail_fast(mut self) -> Self {
        self.options = self.options.with_fail_fast(true);
        self
    }

    pub fn profile(&self) -> Result<SweepProfile, HarnessError> {
        let mut profile = SweepProfile::neutral_only("bench", self.presets.clone())?;
        profile.perturbations = self.perturbations.clone();
        Ok(profile)
    }

    /// Run the sweep in a fresh temporary directory.
    pub fn run(&self) -> Result<BenchRun, HarnessError> {
        let dir = tempfile::tempdir()?;
        let outcome = self.sweep(&dir)?;
        Ok(BenchRun {
            bench: self.clone(),
            dir,
            outcome,
        })
    }

    fn sweep(&self, dir: &TempDir) -> Result<SweepOutcome, HarnessError> {
        let lock = InterfaceLock::from_named(&self.lock_values)?;
        let cache = ExportCache::new(dir.path().join("cache"), Arc::new(self.generator.clone()))?;
        let mut geometry = lock.fit_geometry();
        if let Some(diameter) = self.ball_diameter {
            geometry = geometry.with_ball_diameter(diameter);
        }
        let suite = FitSuite::new(geometry, self.sampling.clone(), self.thresholds.clone().build()?)?;
        let outcome = Orchestrator::with_suite(&lock, &cache, suite).run(&self.profile()?, &self.options)?;
        Ok(outcome)
    }
}

/// A finished sweep and the directory that holds its cache.
pub struct BenchRun {
    bench: FitBench,
    dir: TempDir,
    pub outcome: SweepOutcome,
}

impl BenchRun {
    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.dir.path().join("golden_signatures.json")
    }

    /// Sweep again over the same cache.
    pub fn rerun(&self) -> Result<SweepOutcome, HarnessError> {
        self.bench.sweep(&self.dir)
    }

    pub fn scenario(&self, id: &str) -> Result<&ScenarioReport, HarnessError> {
        self.outcome
            .scenarios
            .iter()
            .find(|s| s.scenario_id == id)
            .ok_or_else(|| HarnessError::NotFound {
                what: format!("scenario {id}"),
            })
    }

    pub fn result(&self, scenario_id: &str, check_id: &str) -> Result<&ValidationResult, HarnessError> {
        self.scenario(scenario_id)?
            .result(check_id)
            .ok_or_else(|| HarnessError::NotFound {
                what: format!("{check_id} in {scenario_id}"),
            })
    }

    pub fn measured(&self, scenario_id: &str, check_id: &str, key: &str) -> Result<f64, HarnessError> {
        self.result(scenario_id, check_id)?
            .measured
            .get(key)
            .copied()
            .ok_or_else(|| HarnessError::NotFound {
                what: format!("{key} of {check_id} in {scenario_id}"),
            })
    }

    /// Commit this run's signatures as the baseline beside the cache.
    pub fn commit(&self, bands: ToleranceBands) -> Result<BaselineFile, HarnessError> {
        let provenance = Provenance {
            committed_by: "test-harness".to_string(),
            source_fingerprint: String::new(),
        };
        Ok(commit_baseline(&self.baseline_path(), &self.outcome.signatures, bands, provenance)?)
    }

    /// Compare this run's signatures against the baseline committed beside it.
    pub fn drift(&self, allow: DriftOverride) -> Result<DriftReport, HarnessError> {
        let baseline = BaselineFile::load(&self.baseline_path())?;
        Ok(self.drift_against(baseline.as_ref(), allow))
    }

    /// Compare against a baseline committed elsewhere, e.g. by another bench.
    pub fn drift_against(&self, baseline: Option<&BaselineFile>, allow: DriftOverride) -> DriftReport {
        compare(baseline, &self.outcome.signatures, &self.bench.presets, allow)
    }

    pub fn policy(&self, drift: &DriftReport) -> PolicySection {
        evaluate_policy(&self.outcome, drift)
    }
}
