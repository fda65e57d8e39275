//! Verification oracles: pure functions returning pass/fail verdicts.
//!
//! Each oracle returns an `OracleVerdict` with diagnostic detail, not panics,
//! so a test can collect every broken property of a sweep in one pass.

use fit_types::{ScenarioReport, ValidationResult};
use sweep_engine::SweepOutcome;

/// The result of a single oracle check.
#[derive(Debug, Clone)]
pub struct OracleVerdict {
    pub oracle_name: String,
    pub passed: bool,
    pub detail: String,
    pub value: Option<f64>,
}

impl OracleVerdict {
    fn pass(name: &str, detail: String) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: true,
            detail,
            value: None,
        }
    }

    fn pass_val(name: &str, detail: String, value: f64) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: true,
            detail,
            value: Some(value),
        }
    }

    fn fail(name: &str, detail: String) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: false,
            detail,
            value: None,
        }
    }

    fn fail_val(name: &str, detail: String, value: f64) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: false,
            detail,
            value: Some(value),
        }
    }
}

// ── Sweep Oracles ───────────────────────────────────────────────────────────

/// Every scenario ran and every check in it passed or was advisory.
pub fn check_all_pass(outcome: &SweepOutcome) -> OracleVerdict {
    let failing: Vec<String> = outcome
        .scenarios
        .iter()
        .filter(|s| !s.pass)
        .map(|s| format!("{} [{}]", s.scenario_id, s.blocking_failures().join(", ")))
        .collect();

    if failing.is_empty() && outcome.not_run.is_empty() {
        OracleVerdict::pass(
            "all_pass",
            format!("{} scenarios passed", outcome.scenarios.len()),
        )
    } else {
        OracleVerdict::fail(
            "all_pass",
            format!("failing: {:?}, not run: {:?}", failing, outcome.not_run),
        )
    }
}

/// A designated gate failed in the named scenario.
pub fn check_gate_failed(outcome: &SweepOutcome, scenario_id: &str, check_id: &str) -> OracleVerdict {
    let gates = outcome.gate_failures();
    if gates
        .iter()
        .any(|g| g.scenario_id == scenario_id && g.check_id == check_id)
    {
        OracleVerdict::pass("gate_failed", format!("{check_id} failed in {scenario_id}"))
    } else {
        OracleVerdict::fail(
            "gate_failed",
            format!("{check_id} did not fail in {scenario_id}; gate failures: {gates:?}"),
        )
    }
}

/// Every export was served from the cache.
pub fn check_cache_reused(outcome: &SweepOutcome) -> OracleVerdict {
    let misses: Vec<&str> = outcome
        .exports
        .iter()
        .filter(|r| !r.cache_hit)
        .map(|r| r.key.as_str())
        .collect();
    if misses.is_empty() {
        OracleVerdict::pass("cache_reused", format!("{} exports hit", outcome.exports.len()))
    } else {
        OracleVerdict::fail("cache_reused", format!("{} misses: {:?}", misses.len(), misses))
    }
}

/// Two runs produced identical scenario reports in identical order.
pub fn check_deterministic(first: &[ScenarioReport], second: &[ScenarioReport]) -> OracleVerdict {
    if first.len() != second.len() {
        return OracleVerdict::fail(
            "deterministic",
            format!("{} scenarios vs {}", first.len(), second.len()),
        );
    }
    for (a, b) in first.iter().zip(second) {
        if a != b {
            let differing: Vec<&str> = a
                .results
                .iter()
                .zip(&b.results)
                .filter(|(x, y)| x != y)
                .map(|(x, _)| x.check_id.as_str())
                .collect();
            return OracleVerdict::fail(
                "deterministic",
                format!("{} differs in {:?}", a.scenario_id, differing),
            );
        }
    }
    OracleVerdict::pass("deterministic", format!("{} scenarios identical", first.len()))
}

// ── Measurement Oracles ─────────────────────────────────────────────────────

/// A measured value is within `tol` of `expected`.
pub fn check_measured(result: &ValidationResult, key: &str, expected: f64, tol: f64) -> OracleVerdict {
    let name = format!("measured:{}:{}", result.check_id, key);
    let Some(&value) = result.measured.get(key) else {
        return OracleVerdict::fail(&name, format!("{key} not measured"));
    };
    if (value - expected).abs() <= tol {
        OracleVerdict::pass_val(&name, format!("{key} = {value:.5}"), value)
    } else {
        OracleVerdict::fail_val(
            &name,
            format!("{key}: expected {expected:.5}, got {value:.5} (tol={tol})"),
            value,
        )
    }
}

/// The reported worst value is the minimum over the per-sample rows.
///
/// `measured_key` names the headline metric, `sample_key` the column of
/// the sample rows it summarizes.
pub fn check_worst_is_sample_min(result: &ValidationResult, measured_key: &str, sample_key: &str) -> OracleVerdict {
    let name = format!("worst_is_sample_min:{}", result.check_id);
    let Some(&worst) = result.measured.get(measured_key) else {
        return OracleVerdict::fail(&name, format!("{measured_key} not measured"));
    };
    let min = result
        .samples
        .iter()
        .filter_map(|row| row.get(sample_key).copied())
        .reduce(f64::min);
    match min {
        None => OracleVerdict::fail(&name, format!("no `{sample_key}` samples")),
        Some(min) if min == worst => OracleVerdict::pass_val(
            &name,
            format!("{measured_key} = min over {} samples", result.samples.len()),
            worst,
        ),
        Some(min) => OracleVerdict::fail_val(
            &name,
            format!("{measured_key} = {worst}, but sample minimum is {min}"),
            worst,
        ),
    }
}

/// Measured values never decrease as the swept parameter increases.
pub fn check_non_decreasing(name: &str, series: &[(f64, f64)]) -> OracleVerdict {
    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    for pair in sorted.windows(2) {
        let ((p0, v0), (p1, v1)) = (pair[0], pair[1]);
        if v1 < v0 {
            return OracleVerdict::fail(
                name,
                format!("at {p0} -> {p1}: {v0:.5} dropped to {v1:.5}"),
            );
        }
    }
    OracleVerdict::pass(name, format!("{} points non-decreasing", sorted.len()))
}

// ── Composite ───────────────────────────────────────────────────────────────

/// Sample-consistency oracles for every scenario that measured them.
pub fn run_sample_checks(outcome: &SweepOutcome) -> Vec<OracleVerdict> {
    use fit_validators::checks;

    let mut verdicts = Vec::new();
    for scenario in &outcome.scenarios {
        if let Some(r) = scenario.result(checks::FRAME_INTERFERENCE) {
            if r.measured.contains_key("frame_min_gap_mm") {
                verdicts.push(check_worst_is_sample_min(r, "frame_min_gap_mm", "gap_mm"));
            }
        }
        if let Some(r) = scenario.result(checks::FLOOR_CLEARANCE) {
            if r.measured.contains_key("floor_clearance_mm") {
                verdicts.push(check_worst_is_sample_min(r, "floor_clearance_mm", "min_clearance_mm"));
            }
        }
    }
    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use fit_types::Threshold;

    fn swing(gaps: &[f64], worst: f64) -> ValidationResult {
        let rows = gaps
            .iter()
            .enumerate()
            .map(|(i, &g)| {
                BTreeMap::from([
                    ("angle_deg".to_string(), i as f64),
                    ("gap_mm".to_string(), g),
                ])
            })
            .collect();
        ValidationResult::judged("frame_interference", "frame_min_gap_mm", worst, Threshold::at_least("frame_min_gap_mm", 0.08))
            .with_samples(rows)
    }

    #[test]
    fn worst_must_match_samples() {
        assert!(check_worst_is_sample_min(&swing(&[2.0, 1.5, 1.8], 1.5), "frame_min_gap_mm", "gap_mm").passed);
        let v = check_worst_is_sample_min(&swing(&[2.0, 1.5, 1.8], 1.8), "frame_min_gap_mm", "gap_mm");
        assert!(!v.passed);
        assert!(v.detail.contains("1.5"), "{}", v.detail);
        assert!(!check_worst_is_sample_min(&swing(&[], 1.0), "frame_min_gap_mm", "gap_mm").passed);
    }

    #[test]
    fn non_decreasing_sorts_by_parameter() {
        assert!(check_non_decreasing("floor", &[(31.0, 3.0), (29.0, 1.0), (30.0, 2.0)]).passed);
        assert!(!check_non_decreasing("floor", &[(29.0, 1.0), (30.0, 0.5)]).passed);
    }

    #[test]
    fn measured_reports_value() {
        let r = swing(&[0.7], 0.7);
        let v = check_measured(&r, "frame_min_gap_mm", 0.7, 1e-9);
        assert!(v.passed);
        assert_eq!(v.value, Some(0.7));
        assert!(!check_measured(&r, "neutral_gap_mm", 2.0, 0.1).passed);
    }
}
