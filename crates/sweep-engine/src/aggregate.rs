//! Collects scenario outcomes from concurrent workers.

use std::sync::Mutex;

use fit_types::ScenarioReport;
use golden_signature::Signature;

/// Everything one scenario produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioRun {
    pub report: ScenarioReport,
    /// Live signature, for neutral scenarios whose body was exported.
    pub signature: Option<Signature>,
    /// Body geometry signature, whenever the body was exported.
    pub geometry: Option<Signature>,
}

/// Append-only sink shared by the workers of one sweep.
///
/// Workers finish in any order; each entry carries its matrix index and
/// [`finalize`](Self::finalize) restores matrix order. Finalizing consumes
/// the aggregator, so nothing can be appended afterwards.
#[derive(Debug, Default)]
pub struct ReportAggregator {
    entries: Mutex<Vec<(usize, ScenarioRun)>>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, index: usize, run: ScenarioRun) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((index, run));
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in matrix order.
    pub fn finalize(self) -> Vec<(usize, ScenarioRun)> {
        let mut entries = self
            .entries
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.sort_by_key(|(index, _)| *index);
        entries
    }
}
