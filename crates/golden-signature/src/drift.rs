//! Live-versus-baseline comparison.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::baseline::BaselineFile;
use crate::metrics::Signature;
use crate::policy::{DriftOverride, OverrideSource};

/// One reason the live signatures disagree with the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DriftEntry {
    OutOfTolerance {
        preset: String,
        metric: String,
        baseline: f64,
        tolerance: f64,
        observed: f64,
        delta: f64,
    },
    MissingMetric {
        preset: String,
        metric: String,
    },
    MissingPreset {
        preset: String,
    },
    MissingBaselineFile,
}

impl DriftEntry {
    pub fn preset(&self) -> Option<&str> {
        match self {
            DriftEntry::OutOfTolerance { preset, .. }
            | DriftEntry::MissingMetric { preset, .. }
            | DriftEntry::MissingPreset { preset } => Some(preset),
            DriftEntry::MissingBaselineFile => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DriftEntry::OutOfTolerance {
                preset,
                metric,
                baseline,
                tolerance,
                observed,
                delta,
            } => format!(
                "{preset}/{metric}: observed {observed:.4} vs baseline {baseline:.4} ± {tolerance:.4} (delta {delta:+.4})"
            ),
            DriftEntry::MissingMetric { preset, metric } => {
                format!("{preset}/{metric}: no live value")
            }
            DriftEntry::MissingPreset { preset } => format!("{preset}: no baseline or no live signature"),
            DriftEntry::MissingBaselineFile => "baseline file missing".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftMode {
    /// Live metrics were checked against the committed file.
    Compare,
    /// Live metrics replaced the committed file; nothing was checked.
    Commit,
}

/// Drift section of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub mode: DriftMode,
    pub entries: Vec<DriftEntry>,
    pub override_source: OverrideSource,
    /// Drift present and not overridden.
    pub blocking: bool,
    /// The live signatures, per preset.
    pub observed: BTreeMap<String, Signature>,
}

impl DriftReport {
    /// Report for a run that committed a new baseline.
    pub fn committed(observed: BTreeMap<String, Signature>, allow: DriftOverride) -> Self {
        Self {
            mode: DriftMode::Commit,
            entries: Vec::new(),
            override_source: allow.source,
            blocking: false,
            observed,
        }
    }

    pub fn drift_detected(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn override_used(&self) -> bool {
        self.drift_detected() && self.override_source != OverrideSource::None
    }

    /// Drifted metric names per preset, sorted and deduplicated.
    pub fn drifted_metrics(&self) -> BTreeMap<String, Vec<String>> {
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in &self.entries {
            if let DriftEntry::OutOfTolerance { preset, metric, .. }
            | DriftEntry::MissingMetric { preset, metric } = entry
            {
                out.entry(preset.clone()).or_default().push(metric.clone());
            }
        }
        for metrics in out.values_mut() {
            metrics.sort();
            metrics.dedup();
        }
        out
    }
}

/// Compare live signatures for `presets` against `baseline`.
///
/// Every baseline metric of every requested preset is checked; live
/// metrics the baseline does not name are ignored. A preset with no live
/// signature (its neutral scenario could not be exported) or no baseline
/// entry is reported as missing.
#[instrument(skip_all, fields(presets = presets.len(), override_source = %allow.source))]
pub fn compare(
    baseline: Option<&BaselineFile>,
    live: &BTreeMap<String, Signature>,
    presets: &[String],
    allow: DriftOverride,
) -> DriftReport {
    let mut entries = Vec::new();
    match baseline {
        None => entries.push(DriftEntry::MissingBaselineFile),
        Some(file) => {
            for preset in presets {
                let (Some(observed), Some(expected)) = (live.get(preset), file.presets.get(preset)) else {
                    entries.push(DriftEntry::MissingPreset {
                        preset: preset.clone(),
                    });
                    continue;
                };
                for (metric, band) in expected {
                    match observed.get(metric) {
                        None => entries.push(DriftEntry::MissingMetric {
                            preset: preset.clone(),
                            metric: metric.clone(),
                        }),
                        Some(&value) if !band.admits(value) => entries.push(DriftEntry::OutOfTolerance {
                            preset: preset.clone(),
                            metric: metric.clone(),
                            baseline: band.baseline,
                            tolerance: band.tolerance,
                            observed: value,
                            delta: band.delta(value),
                        }),
                        Some(_) => {}
                    }
                }
            }
        }
    }

    let report = DriftReport {
        mode: DriftMode::Compare,
        blocking: !entries.is_empty() && !allow.enabled(),
        entries,
        override_source: allow.source,
        observed: live.clone(),
    };
    if report.override_used() {
        for entry in &report.entries {
            warn!(drift = %entry.describe(), source = %allow.source, "drift allowed by override");
        }
    } else if report.blocking {
        for entry in &report.entries {
            warn!(drift = %entry.describe(), "signature drift");
        }
    } else {
        info!("signatures within tolerance");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::{Provenance, ToleranceBands};
    use crate::metrics::{FRAME_GAP, VOLUME};

    fn signature(volume: f64, gap: Option<f64>) -> Signature {
        let mut s = Signature::from([(VOLUME.to_string(), volume)]);
        if let Some(g) = gap {
            s.insert(FRAME_GAP.to_string(), g);
        }
        s
    }

    fn baseline() -> BaselineFile {
        let live = BTreeMap::from([("default".to_string(), signature(1000.0, Some(0.5)))]);
        BaselineFile::from_live(
            &live,
            ToleranceBands::default(),
            Provenance {
                committed_by: "test".into(),
                source_fingerprint: "abc".into(),
            },
        )
    }

    fn presets() -> Vec<String> {
        vec!["default".to_string()]
    }

    #[test]
    fn within_tolerance_is_clean() {
        let live = BTreeMap::from([("default".to_string(), signature(1020.0, Some(0.9)))]);
        let report = compare(Some(&baseline()), &live, &presets(), DriftOverride::NONE);
        assert!(report.entries.is_empty());
        assert!(!report.blocking);
    }

    #[test]
    fn out_of_tolerance_blocks_with_delta() {
        let live = BTreeMap::from([("default".to_string(), signature(1040.0, Some(0.5)))]);
        let report = compare(Some(&baseline()), &live, &presets(), DriftOverride::NONE);
        assert!(report.blocking);
        assert_eq!(
            report.entries,
            vec![DriftEntry::OutOfTolerance {
                preset: "default".into(),
                metric: VOLUME.into(),
                baseline: 1000.0,
                tolerance: 30.0,
                observed: 1040.0,
                delta: 40.0,
            }]
        );
    }

    #[test]
    fn override_keeps_entries_but_unblocks() {
        let live = BTreeMap::from([("default".to_string(), signature(1040.0, None))]);
        let allow = DriftOverride::resolve(false, Some("on"));
        let report = compare(Some(&baseline()), &live, &presets(), allow);
        assert!(!report.blocking);
        assert!(report.override_used());
        assert_eq!(report.override_source, OverrideSource::Env);
        assert_eq!(
            report.drifted_metrics()["default"],
            vec![FRAME_GAP.to_string(), VOLUME.to_string()]
        );
    }

    #[test]
    fn missing_inputs_are_drift() {
        let live = BTreeMap::new();
        let none = compare(None, &live, &presets(), DriftOverride::NONE);
        assert_eq!(none.entries, vec![DriftEntry::MissingBaselineFile]);
        assert!(none.blocking);

        let extra = vec!["default".to_string(), "deep_floor".to_string()];
        let live = BTreeMap::from([("default".to_string(), signature(1000.0, Some(0.5)))]);
        let report = compare(Some(&baseline()), &live, &extra, DriftOverride::NONE);
        assert_eq!(
            report.entries,
            vec![DriftEntry::MissingPreset {
                preset: "deep_floor".into()
            }]
        );
    }

    #[test]
    fn nan_is_out_of_tolerance() {
        let live = BTreeMap::from([("default".to_string(), signature(f64::NAN, Some(0.5)))]);
        let report = compare(Some(&baseline()), &live, &presets(), DriftOverride::NONE);
        assert_eq!(report.entries.len(), 1);
    }
}
