//! Validation outcomes: one `ValidationResult` per check invocation and
//! one `ScenarioReport` per scenario.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scenario::ScenarioSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skip => "SKIP",
        };
        f.write_str(s)
    }
}

/// Why a check failed. Integrity and export failures are kept apart from
/// ordinary threshold violations so a reader never mistakes "could not
/// measure" for "measured and too small".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Threshold,
    MeshIntegrity,
    Export,
    ExportTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// measured >= value
    AtLeast,
    /// measured <= value
    AtMost,
    /// |measured - target| <= tolerance
    Within,
    /// lower <= measured <= upper
    Between,
}

/// The limit a measured value was compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub name: String,
    pub comparison: Comparison,
    pub values: Vec<f64>,
}

impl Threshold {
    pub fn at_least(name: &str, min: f64) -> Self {
        Self {
            name: name.to_string(),
            comparison: Comparison::AtLeast,
            values: vec![min],
        }
    }

    pub fn at_most(name: &str, max: f64) -> Self {
        Self {
            name: name.to_string(),
            comparison: Comparison::AtMost,
            values: vec![max],
        }
    }

    pub fn within(name: &str, target: f64, tolerance: f64) -> Self {
        Self {
            name: name.to_string(),
            comparison: Comparison::Within,
            values: vec![target, tolerance],
        }
    }

    pub fn between(name: &str, lower: f64, upper: f64) -> Self {
        Self {
            name: name.to_string(),
            comparison: Comparison::Between,
            values: vec![lower, upper],
        }
    }

    /// Whether `measured` satisfies this threshold. NaN never does.
    pub fn admits(&self, measured: f64) -> bool {
        if !measured.is_finite() {
            return false;
        }
        match (self.comparison, self.values.as_slice()) {
            (Comparison::AtLeast, [min, ..]) => measured >= *min,
            (Comparison::AtMost, [max, ..]) => measured <= *max,
            (Comparison::Within, [target, tol, ..]) => (measured - target).abs() <= *tol,
            (Comparison::Between, [lo, hi, ..]) => measured >= *lo && measured <= *hi,
            _ => false,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.comparison, self.values.as_slice()) {
            (Comparison::AtLeast, [v, ..]) => write!(f, "{} >= {v}", self.name),
            (Comparison::AtMost, [v, ..]) => write!(f, "{} <= {v}", self.name),
            (Comparison::Within, [t, tol, ..]) => write!(f, "{} = {t} ± {tol}", self.name),
            (Comparison::Between, [lo, hi, ..]) => write!(f, "{} in [{lo}, {hi}]", self.name),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub check_id: String,
    pub status: CheckStatus,
    pub blocking: bool,
    pub measured: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Threshold>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Per-sample rows behind the headline measurement, in sampling order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<BTreeMap<String, f64>>,
}

impl ValidationResult {
    fn new(check_id: &str, status: CheckStatus, message: String) -> Self {
        Self {
            check_id: check_id.to_string(),
            status,
            blocking: true,
            measured: BTreeMap::new(),
            threshold: None,
            message,
            failure: None,
            samples: Vec::new(),
        }
    }

    pub fn pass(check_id: &str, message: impl Into<String>) -> Self {
        Self::new(check_id, CheckStatus::Pass, message.into())
    }

    pub fn fail(check_id: &str, message: impl Into<String>) -> Self {
        let mut r = Self::new(check_id, CheckStatus::Fail, message.into());
        r.failure = Some(FailureKind::Threshold);
        r
    }

    pub fn skip(check_id: &str, message: impl Into<String>) -> Self {
        Self::new(check_id, CheckStatus::Skip, message.into())
    }

    /// The mesh could not be trusted; nothing was measured.
    pub fn integrity_failure(check_id: &str, message: impl Into<String>) -> Self {
        let mut r = Self::new(check_id, CheckStatus::Fail, message.into());
        r.failure = Some(FailureKind::MeshIntegrity);
        r
    }

    pub fn export_failure(check_id: &str, timed_out: bool, message: impl Into<String>) -> Self {
        let mut r = Self::new(check_id, CheckStatus::Fail, message.into());
        r.failure = Some(if timed_out {
            FailureKind::ExportTimeout
        } else {
            FailureKind::Export
        });
        r
    }

    /// Pass or fail depending on whether `measured` satisfies `threshold`.
    /// The value is always recorded under `metric`.
    pub fn judged(check_id: &str, metric: &str, measured: f64, threshold: Threshold) -> Self {
        let ok = threshold.admits(measured);
        let message = if ok {
            format!("{metric} = {measured:.4} satisfies {threshold}")
        } else {
            format!("{metric} = {measured:.4} violates {threshold}")
        };
        let r = if ok {
            Self::pass(check_id, message)
        } else {
            Self::fail(check_id, message)
        };
        r.with_measured(metric, measured).with_threshold(threshold)
    }

    pub fn with_measured(mut self, name: &str, value: f64) -> Self {
        self.measured.insert(name.to_string(), value);
        self
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_samples(mut self, samples: Vec<BTreeMap<String, f64>>) -> Self {
        self.samples = samples;
        self
    }

    /// Mark the result advisory. Advisory results never gate a scenario.
    pub fn advisory(mut self) -> Self {
        self.blocking = false;
        self
    }

    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }

    pub fn is_failure(&self) -> bool {
        self.status == CheckStatus::Fail
    }
}

/// All results for one scenario. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario_id: String,
    pub scenario: ScenarioSpec,
    pub results: Vec<ValidationResult>,
    pub pass: bool,
}

impl ScenarioReport {
    pub fn new(scenario: ScenarioSpec, results: Vec<ValidationResult>) -> Self {
        let pass = Self::evaluate(&results);
        Self {
            scenario_id: scenario.id(),
            scenario,
            results,
            pass,
        }
    }

    /// AND over blocking, non-skipped results. An empty list never passes.
    fn evaluate(results: &[ValidationResult]) -> bool {
        !results.is_empty()
            && results
                .iter()
                .filter(|r| r.blocking && r.status != CheckStatus::Skip)
                .all(|r| r.status == CheckStatus::Pass)
    }

    pub fn result(&self, check_id: &str) -> Option<&ValidationResult> {
        self.results.iter().find(|r| r.check_id == check_id)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    /// Failing blocking checks, in result order.
    pub fn blocking_failures(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.blocking && r.is_failure())
            .map(|r| r.check_id.as_str())
            .collect()
    }
}
