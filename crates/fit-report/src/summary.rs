//! Human-readable run summary for the terminal.

use std::fmt::Write;

use golden_signature::{DriftMode, OverrideSource};

use crate::report::FullValidationReport;

/// One line per scenario with its failing checks, then drift, then the verdict.
pub fn render_summary(report: &FullValidationReport) -> String {
    let mut out = String::new();
    let profile = &report.provenance.sweep_profile;
    let _ = writeln!(
        out,
        "fitgate run {} (profile {}, {} scenarios)",
        report.run_id,
        profile.name,
        report.scenarios.len() + report.policy.not_run.len()
    );

    for scenario in &report.scenarios {
        let verdict = if scenario.pass { "PASS" } else { "FAIL" };
        let _ = writeln!(out, "  {verdict} {}", scenario.scenario_id);
        for result in scenario.failures() {
            let tag = if result.blocking { "" } else { " (advisory)" };
            let _ = writeln!(out, "      {}{tag}: {}", result.check_id, result.message);
        }
    }
    for id in &report.policy.not_run {
        let _ = writeln!(out, "  SKIP {id} (fail-fast)");
    }
    for gate in &report.policy.gate_failures {
        let _ = writeln!(out, "  gate {} failed in {}", gate.check_id, gate.scenario_id);
    }

    let drift = &report.drift;
    match drift.mode {
        DriftMode::Commit => {
            let _ = writeln!(out, "drift: baseline committed for {} preset(s)", drift.observed.len());
        }
        DriftMode::Compare if drift.entries.is_empty() => {
            let _ = writeln!(out, "drift: none");
        }
        DriftMode::Compare => {
            let _ = writeln!(out, "drift: {} entr(ies)", drift.entries.len());
            for entry in &drift.entries {
                let _ = writeln!(out, "  DRIFT {}", entry.describe());
            }
        }
    }
    match drift.override_source {
        OverrideSource::None => {}
        source if report.policy.override_used => {
            let _ = writeln!(out, "override: {source} (drift downgraded to advisory)");
        }
        source => {
            let _ = writeln!(out, "override: {source} (unused)");
        }
    }

    let _ = writeln!(out, "OVERALL: {}", if report.overall_pass { "PASS" } else { "FAIL" });
    out
}
