//! Runs every scenario of a profile through export and validation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use fit_types::{PartKind, ScenarioReport, ScenarioSpec, ValidationResult};
use fit_validators::{checks, FitSuite, FitThresholds, SamplingConfig, ScenarioParts};
use golden_signature::{geometry_signature, signature_metrics, Signature};
use interface_lock::InterfaceLock;
use mesh_export::{ExportCache, ExportError, ExportRecord};
use mesh_query::MeshHandle;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::aggregate::{ReportAggregator, ScenarioRun};
use crate::error::SweepError;
use crate::profile::SweepProfile;
use crate::sensitivity::{self, DEFAULT_MIN_SHAPE_DELTA};

#[derive(Debug, Clone, PartialEq)]
pub struct SweepOptions {
    /// Worker threads. Scenarios are the unit of parallelism.
    pub jobs: usize,
    /// Stop scheduling scenarios after the first failing one.
    pub fail_fast: bool,
    /// Smallest geometry change a perturbation must cause.
    pub min_shape_delta: f64,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            jobs: std::thread::available_parallelism().map_or(1, |n| n.get()),
            fail_fast: false,
            min_shape_delta: DEFAULT_MIN_SHAPE_DELTA,
        }
    }
}

impl SweepOptions {
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_min_shape_delta(mut self, delta: f64) -> Self {
        self.min_shape_delta = delta;
        self
    }
}

/// A designated sweep gate that failed in some scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateFailure {
    pub scenario_id: String,
    pub check_id: String,
}

#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub profile: SweepProfile,
    /// Reports in matrix order.
    pub scenarios: Vec<ScenarioReport>,
    /// Scenarios never started because fail-fast tripped.
    pub not_run: Vec<String>,
    pub exports: Vec<ExportRecord>,
    /// Live signature per preset, from its neutral scenario.
    pub signatures: BTreeMap<String, Signature>,
}

impl SweepOutcome {
    /// Every scenario ran and passed.
    pub fn all_pass(&self) -> bool {
        !self.scenarios.is_empty() && self.not_run.is_empty() && self.scenarios.iter().all(|s| s.pass)
    }

    /// Failures of the designated gates, in matrix order.
    pub fn gate_failures(&self) -> Vec<GateFailure> {
        self.scenarios
            .iter()
            .flat_map(|s| {
                s.results
                    .iter()
                    .filter(|r| r.is_failure() && checks::SWEEP_GATES.contains(&r.check_id.as_str()))
                    .map(|r| GateFailure {
                        scenario_id: s.scenario_id.clone(),
                        check_id: r.check_id.clone(),
                    })
            })
            .collect()
    }
}

/// Parts that do not vary per scenario, or why they are unavailable.
type SharedParts = Result<(MeshHandle, MeshHandle), ValidationResult>;

fn export_failure(part: PartKind, error: &ExportError) -> ValidationResult {
    ValidationResult::export_failure(checks::EXPORT, error.is_timeout(), format!("{part}: {error}"))
}

/// Drives one sweep. The lock and cache are borrowed; nothing global.
pub struct Orchestrator<'a> {
    lock: &'a InterfaceLock,
    cache: &'a ExportCache,
    suite: FitSuite,
}

impl<'a> Orchestrator<'a> {
    /// Validators configured from the lock's geometry.
    pub fn new(
        lock: &'a InterfaceLock,
        cache: &'a ExportCache,
        sampling: SamplingConfig,
        thresholds: FitThresholds,
    ) -> Result<Self, SweepError> {
        let suite = FitSuite::new(lock.fit_geometry(), sampling, thresholds)?;
        Ok(Self::with_suite(lock, cache, suite))
    }

    /// Use an already configured suite, e.g. with a modified mating geometry.
    pub fn with_suite(lock: &'a InterfaceLock, cache: &'a ExportCache, suite: FitSuite) -> Self {
        Self { lock, cache, suite }
    }

    pub fn suite(&self) -> &FitSuite {
        &self.suite
    }

    /// Validate every scenario of `profile`.
    ///
    /// The lock is asserted before anything is exported; a violation aborts
    /// the run. Every other failure is confined to its scenario.
    #[instrument(skip_all, fields(profile = %profile.name, jobs = options.jobs, fail_fast = options.fail_fast))]
    pub fn run(&self, profile: &SweepProfile, options: &SweepOptions) -> Result<SweepOutcome, SweepError> {
        self.lock.assert_invariants()?;

        let unknown: Vec<String> = profile
            .presets
            .iter()
            .filter(|p| !self.cache.has_preset(p))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(SweepError::UnknownPresets(unknown));
        }

        let shared = self.export_shared();
        let scenarios = profile.scenarios();
        info!(scenarios = scenarios.len(), "starting sweep");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs.max(1))
            .build()?;
        let aggregator = ReportAggregator::new();
        let tripped = AtomicBool::new(false);
        pool.install(|| {
            scenarios.par_iter().enumerate().for_each(|(index, spec)| {
                if options.fail_fast && tripped.load(Ordering::SeqCst) {
                    return;
                }
                let run = self.run_scenario(spec, &shared);
                if !run.report.pass {
                    tripped.store(true, Ordering::SeqCst);
                }
                aggregator.append(index, run);
            });
        });

        let finished = aggregator.finalize();
        let neutral_geometry: BTreeMap<&str, &Signature> = finished
            .iter()
            .filter(|(_, run)| run.report.scenario.is_neutral())
            .filter_map(|(_, run)| Some((run.report.scenario.preset(), run.geometry.as_ref()?)))
            .collect();
        let sensitivity: Vec<Option<ValidationResult>> = finished
            .iter()
            .map(|(_, run)| {
                let geometry = run.geometry.as_ref().filter(|_| !run.report.scenario.is_neutral())?;
                let neutral = neutral_geometry.get(run.report.scenario.preset()).copied();
                Some(sensitivity::judge(neutral, geometry, options.min_shape_delta))
            })
            .collect();

        let mut finished = finished.into_iter().zip(sensitivity).peekable();
        let mut reports = Vec::with_capacity(scenarios.len());
        let mut not_run = Vec::new();
        let mut signatures = BTreeMap::new();
        for (index, spec) in scenarios.iter().enumerate() {
            match finished.next_if(|((i, _), _)| *i == index) {
                Some(((_, run), shape)) => {
                    if let Some(signature) = run.signature {
                        signatures.insert(spec.preset().to_string(), signature);
                    }
                    let report = match shape {
                        Some(result) => {
                            if result.is_failure() {
                                warn!(scenario = %spec.id(), detail = %result.message, "shape sensitivity failed");
                            }
                            let mut results = run.report.results;
                            results.push(result);
                            ScenarioReport::new(spec.clone(), results)
                        }
                        None => run.report,
                    };
                    reports.push(report);
                }
                None => not_run.push(spec.id()),
            }
        }

        let outcome = SweepOutcome {
            profile: profile.clone(),
            scenarios: reports,
            not_run,
            exports: self.cache.records(),
            signatures,
        };
        for gate in outcome.gate_failures() {
            warn!(scenario = %gate.scenario_id, check = %gate.check_id, "sweep gate failed");
        }
        info!(
            pass = outcome.all_pass(),
            ran = outcome.scenarios.len(),
            not_run = outcome.not_run.len(),
            "sweep finished"
        );
        Ok(outcome)
    }

    fn export_shared(&self) -> SharedParts {
        let fetch = |part| {
            self.cache.export_shared(part).map_err(|e| {
                warn!(%part, error = %e, "shared export failed");
                export_failure(part, &e)
            })
        };
        Ok((fetch(PartKind::Frame)?, fetch(PartKind::Plug)?))
    }

    #[instrument(skip_all, fields(scenario = %spec.id()))]
    fn run_scenario(&self, spec: &ScenarioSpec, shared: &SharedParts) -> ScenarioRun {
        let failed = |result: ValidationResult| ScenarioRun {
            report: ScenarioReport::new(spec.clone(), vec![result]),
            signature: None,
            geometry: None,
        };
        let (frame, plug) = match shared {
            Ok(parts) => parts.clone(),
            Err(result) => return failed(result.clone()),
        };
        let body = match self.cache.export(PartKind::Body, spec) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "body export failed");
                return failed(export_failure(PartKind::Body, &e));
            }
        };

        let parts = ScenarioParts { body, frame, plug };
        let mut results = vec![ValidationResult::pass(checks::EXPORT, "body, frame and plug exported")];
        results.extend(self.suite.run(&parts));
        let report = ScenarioReport::new(spec.clone(), results);
        let signature = spec
            .is_neutral()
            .then(|| signature_metrics(&parts.body, &report));
        let geometry = Some(geometry_signature(&parts.body));
        info!(pass = report.pass, failing = ?report.blocking_failures(), "scenario finished");
        ScenarioRun {
            report,
            signature,
            geometry,
        }
    }
}
