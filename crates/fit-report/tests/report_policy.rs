//! Gate policy, serialized shape and summary of a report built from a
//! hand-made sweep outcome.

use std::collections::BTreeMap;
use std::path::PathBuf;

use fit_report::{check_report, inputs_hash, render_summary, AdvisoryVerdict, Freshness, FullValidationReport, Provenance};
use fit_types::{ScenarioReport, ScenarioSpec, Threshold, ValidationResult};
use fit_validators::{checks, FitThresholds, SamplingConfig};
use golden_signature::{compare, BaselineFile, DriftOverride, Provenance as BaselineProvenance, Signature, ToleranceBands};
use sweep_engine::{SweepOutcome, SweepProfile};

fn floor_result(value: f64) -> ValidationResult {
    ValidationResult::judged(
        checks::FLOOR_CLEARANCE,
        "floor_clearance_mm",
        value,
        Threshold::at_least("floor_clearance_mm", 2.0),
    )
}

fn outcome(floor: f64) -> SweepOutcome {
    let profile = SweepProfile::neutral_only("full", vec!["default".into()]).unwrap();
    let report = ScenarioReport::new(
        ScenarioSpec::neutral("default"),
        vec![ValidationResult::pass(checks::EXPORT, "exported"), floor_result(floor)],
    );
    SweepOutcome {
        profile,
        scenarios: vec![report],
        not_run: Vec::new(),
        exports: Vec::new(),
        signatures: BTreeMap::from([(
            "default".to_string(),
            Signature::from([("floor_clearance_mm".to_string(), floor)]),
        )]),
    }
}

fn baseline(floor: f64) -> BaselineFile {
    BaselineFile::from_live(
        &BTreeMap::from([(
            "default".to_string(),
            Signature::from([("floor_clearance_mm".to_string(), floor)]),
        )]),
        ToleranceBands::default(),
        BaselineProvenance {
            committed_by: "test".into(),
            source_fingerprint: "abc".into(),
        },
    )
}

fn provenance(root: PathBuf, inputs_hash: String, profile: SweepProfile) -> Provenance {
    Provenance {
        source_root: root,
        source_fingerprint: "abc".into(),
        inputs: vec![PathBuf::from("fitgate")],
        inputs_hash,
        generator: "procedural".into(),
        tool_version: "0.1.0".into(),
        lock_values: BTreeMap::new(),
        lock_fingerprint: String::new(),
        thresholds: FitThresholds::default(),
        sampling: SamplingConfig::default(),
        sweep_profile: profile,
    }
}

fn build(floor: f64, baseline_floor: f64, allow: DriftOverride) -> FullValidationReport {
    let outcome = outcome(floor);
    let presets = outcome.profile.presets.clone();
    let drift = compare(Some(&baseline(baseline_floor)), &outcome.signatures, &presets, allow);
    let provenance = provenance(PathBuf::from("/nowhere"), String::new(), outcome.profile.clone());
    FullValidationReport::new(provenance, outcome, drift)
}

#[test]
fn clean_run_passes() {
    let report = build(4.0, 4.0, DriftOverride::NONE);
    assert!(report.policy.all_scenarios_pass);
    assert!(report.policy.no_unresolved_drift);
    assert!(report.overall_pass);
    assert!(render_summary(&report).ends_with("OVERALL: PASS\n"));
}

#[test]
fn drift_blocks_without_override() {
    let report = build(4.0, 5.0, DriftOverride::NONE);
    assert!(report.policy.all_scenarios_pass);
    assert!(!report.policy.no_unresolved_drift);
    assert!(!report.overall_pass);

    let summary = render_summary(&report);
    assert!(summary.contains("DRIFT default/floor_clearance_mm"), "{summary}");
    assert!(summary.ends_with("OVERALL: FAIL\n"));
}

#[test]
fn override_passes_but_stays_on_record() {
    let report = build(4.0, 5.0, DriftOverride::resolve(true, None));
    assert!(report.overall_pass);
    assert!(report.policy.override_used);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["policy"]["override_source"], "cli");
    assert_eq!(json["drift"]["entries"][0]["status"], "out_of_tolerance");
    assert_eq!(json["drift"]["entries"][0]["metric"], "floor_clearance_mm");
    assert_eq!(json["overall_pass"], true);
    assert!(render_summary(&report).contains("override: cli (drift downgraded to advisory)"));
}

#[test]
fn failing_gate_fails_even_without_drift() {
    let report = build(1.0, 1.0, DriftOverride::resolve(true, None));
    assert!(!report.policy.all_scenarios_pass);
    assert!(!report.overall_pass);
    assert_eq!(report.policy.gate_failures[0].check_id, checks::FLOOR_CLEARANCE);
}

#[test]
fn written_report_is_fresh_until_inputs_change() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    std::fs::create_dir_all(root.join("fitgate")).unwrap();
    std::fs::write(root.join("fitgate/sweep_config.json"), "{}").unwrap();

    let outcome = outcome(4.0);
    let drift = compare(
        Some(&baseline(4.0)),
        &outcome.signatures,
        &outcome.profile.presets,
        DriftOverride::NONE,
    );
    let hash = inputs_hash(&root, &[PathBuf::from("fitgate")]).unwrap();
    let report = FullValidationReport::new(provenance(root.clone(), hash, outcome.profile.clone()), outcome, drift);
    let path = root.join("out/report.json");
    report.write(&path).unwrap();

    assert_eq!(check_report(&path, &root), (Freshness::Fresh, AdvisoryVerdict::Pass));
    std::fs::write(root.join("fitgate/sweep_config.json"), "{ }").unwrap();
    assert_eq!(check_report(&path, &root).1, AdvisoryVerdict::Unknown);
}
