//! Assertion helpers with diagnostic output.
//!
//! Every failure names the context, the expected and actual values, and
//! the check message that produced them.

use fit_types::{CheckStatus, FailureKind};
use golden_signature::{DriftReport, OverrideSource};
use interface_lock::LockViolationError;

use crate::bench::BenchRun;
use crate::error::HarnessError;
use crate::oracle::OracleVerdict;

fn failed(ctx: &str, detail: String) -> HarnessError {
    HarnessError::AssertionFailed {
        detail: format!("[{ctx}] {detail}"),
    }
}

/// Assert the status of one check in one scenario.
pub fn assert_check_status(
    run: &BenchRun,
    scenario_id: &str,
    check_id: &str,
    expected: CheckStatus,
    ctx: &str,
) -> Result<(), HarnessError> {
    let result = run.result(scenario_id, check_id)?;
    if result.status == expected {
        Ok(())
    } else {
        Err(failed(
            ctx,
            format!(
                "{scenario_id}/{check_id}: expected {expected:?}, got {:?} ({})",
                result.status, result.message
            ),
        ))
    }
}

/// Assert a measured value lies within `tol` of `expected`.
pub fn assert_measured_near(
    run: &BenchRun,
    scenario_id: &str,
    check_id: &str,
    key: &str,
    expected: f64,
    tol: f64,
    ctx: &str,
) -> Result<(), HarnessError> {
    let value = run.measured(scenario_id, check_id, key)?;
    if (value - expected).abs() <= tol {
        Ok(())
    } else {
        Err(failed(
            ctx,
            format!("{scenario_id}/{check_id} {key}: expected {expected:.5}, got {value:.5} (tol={tol})"),
        ))
    }
}

/// Assert the scenario failed with the given failure kind somewhere.
pub fn assert_failure_kind(
    run: &BenchRun,
    scenario_id: &str,
    kind: FailureKind,
    ctx: &str,
) -> Result<(), HarnessError> {
    let scenario = run.scenario(scenario_id)?;
    if scenario.failures().any(|r| r.failure == Some(kind)) {
        Ok(())
    } else {
        let seen: Vec<_> = scenario.failures().map(|r| (&r.check_id, r.failure)).collect();
        Err(failed(ctx, format!("{scenario_id}: no {kind:?} failure; saw {seen:?}")))
    }
}

/// Assert a sweep was refused because the interface lock was violated,
/// naming `name` among the offenders.
pub fn assert_lock_rejected<T>(
    outcome: Result<T, HarnessError>,
    name: &str,
    ctx: &str,
) -> Result<LockViolationError, HarnessError> {
    match outcome {
        Ok(_) => Err(failed(ctx, "sweep ran despite a lock violation".to_string())),
        Err(HarnessError::Sweep(sweep_engine::SweepError::Lock(violation))) => {
            if violation.violations.iter().any(|d| d.name == name) {
                Ok(violation)
            } else {
                Err(failed(ctx, format!("{name} not among offenders: {violation}")))
            }
        }
        Err(other) => Err(failed(ctx, format!("expected a lock violation, got {other}"))),
    }
}

/// Assert whether drift blocks the gate, and which override was applied.
pub fn assert_drift_gate(
    drift: &DriftReport,
    blocking: bool,
    override_source: OverrideSource,
    ctx: &str,
) -> Result<(), HarnessError> {
    if drift.blocking == blocking && drift.override_source == override_source {
        Ok(())
    } else {
        let entries: Vec<String> = drift.entries.iter().map(|e| e.describe()).collect();
        Err(failed(
            ctx,
            format!(
                "expected blocking={blocking} override={override_source}, got blocking={} override={} ({entries:?})",
                drift.blocking, drift.override_source
            ),
        ))
    }
}

/// Turn failed verdicts into one assertion error listing all of them.
pub fn assert_verdicts(verdicts: &[OracleVerdict], ctx: &str) -> Result<(), HarnessError> {
    let failures: Vec<String> = verdicts
        .iter()
        .filter(|v| !v.passed)
        .map(|v| format!("{}: {}", v.oracle_name, v.detail))
        .collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(failed(ctx, failures.join("; ")))
    }
}
