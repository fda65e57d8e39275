//! End-to-end runs of the `fitgate` binary on the procedural fixture.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

const LOCK_SOURCE: &str = "\
REFERENCE_COORDINATE_RIM_Z = 45;
REFERENCE_SLOT_ENTRY_Z = REFERENCE_COORDINATE_RIM_Z;
REFERENCE_PIVOT_Z = REFERENCE_SLOT_ENTRY_Z - 7;
REFERENCE_PIVOT_Y = 33;
REFERENCE_SLOT_DIAMETER = 7.5;
REFERENCE_BALL_DIAMETER = 7.25;
REFERENCE_FRAME_SPACING = 16;
REFERENCE_FRAME_BOTTOM_Z = 17;
REFERENCE_MODEL_RIM_Z = 0;
";

const SWEEP_CONFIG: &str = r#"{
    "profiles": {
        "quick": { "presets": ["default"] },
        "full": {
            "presets": ["default", "deep_floor"],
            "perturbations": [{ "name": "thin_floor", "overrides": { "cavity_depth_mm": 29.0 } }]
        }
    }
}"#;

fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("fitgate")).unwrap();
    fs::write(dir.path().join("fitgate/interface_lock.scad"), LOCK_SOURCE).unwrap();
    fs::write(dir.path().join("fitgate/sweep_config.json"), SWEEP_CONFIG).unwrap();
    dir
}

fn fitgate() -> Command {
    let mut cmd = Command::cargo_bin("fitgate").unwrap();
    cmd.env_remove("FITGATE_ALLOW_DRIFT").env("FITGATE_LOG", "warn");
    cmd
}

fn validate(root: &Path, extra: &[&str]) -> Command {
    let mut cmd = fitgate();
    cmd.arg("validate")
        .arg("--project-root")
        .arg(root)
        .arg("--output")
        .arg(root.join("out/report.json"))
        .args(["--procedural", "--quick"])
        .args(extra);
    cmd
}

fn report(root: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(root.join("out/report.json")).unwrap()).unwrap()
}

#[test]
fn missing_baseline_blocks_until_committed() {
    let dir = project();
    let root = dir.path();

    validate(root, &[])
        .assert()
        .code(1)
        .stdout(contains("PASS default:neutral"))
        .stdout(contains("baseline file missing"))
        .stdout(contains("OVERALL: FAIL"));
    assert_eq!(report(root)["policy"]["all_scenarios_pass"], true);
    assert_eq!(report(root)["policy"]["no_unresolved_drift"], false);

    validate(root, &["--write-baseline"])
        .assert()
        .code(0)
        .stdout(contains("baseline committed"));
    assert!(root.join("fitgate/golden_signatures.json").is_file());
    assert_eq!(report(root)["drift"]["mode"], "commit");

    validate(root, &[]).assert().code(0).stdout(contains("OVERALL: PASS"));
    fitgate()
        .arg("check-report")
        .arg("--project-root")
        .arg(root)
        .arg("--report")
        .arg(root.join("out/report.json"))
        .assert()
        .code(0)
        .stdout("PASS\n");
}

#[test]
fn drift_override_comes_from_env_and_is_reported() {
    let dir = project();
    let root = dir.path();
    validate(root, &["--write-baseline"]).assert().code(0);

    // Move the committed floor baseline so the live value drifts.
    let path = root.join("fitgate/golden_signatures.json");
    let mut baseline: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    baseline["presets"]["default"]["floor_clearance_mm"]["baseline"] = serde_json::json!(6.0);
    fs::write(&path, baseline.to_string()).unwrap();

    validate(root, &[])
        .assert()
        .code(1)
        .stdout(contains("DRIFT default/floor_clearance_mm"));

    validate(root, &[])
        .env("FITGATE_ALLOW_DRIFT", "yes")
        .assert()
        .code(0)
        .stdout(contains("override: env"));
    let json = report(root);
    assert_eq!(json["policy"]["override_source"], "env");
    assert_eq!(json["policy"]["override_used"], true);
    assert_eq!(json["drift"]["entries"][0]["metric"], "floor_clearance_mm");
}

#[test]
fn threshold_override_fails_floor_gate() {
    let dir = project();
    let root = dir.path();
    validate(root, &["--write-baseline"]).assert().code(0);
    validate(root, &["--floor-clearance-min-mm", "5"])
        .assert()
        .code(1)
        .stdout(contains("gate floor_clearance failed in default:neutral"));
}

#[test]
fn wider_swing_range_fails_frame_gate() {
    let dir = project();
    let root = dir.path();
    validate(root, &["--write-baseline"]).assert().code(0);
    // Past 24 degrees the frame corner reaches the trench wall.
    validate(root, &["--kinematic-angle-max-deg", "30"])
        .assert()
        .code(1)
        .stdout(contains("gate frame_interference failed in default:neutral"));
    assert_eq!(report(root)["provenance"]["sampling"]["angle_max_deg"], 30.0);
    // A narrower swing moves the committed frame gap, so drift is allowed.
    validate(
        root,
        &["--allow-drift", "--kinematic-angle-min-deg", "-12", "--kinematic-angle-max-deg", "12"],
    )
    .assert()
    .code(0);
    assert_eq!(report(root)["provenance"]["sampling"]["angle_min_deg"], -12.0);
}

#[test]
fn committed_bands_decide_drift() {
    let dir = project();
    let root = dir.path();
    validate(root, &["--write-baseline", "--signature-absolute-band-mm", "3"])
        .assert()
        .code(0);
    let path = root.join("fitgate/golden_signatures.json");
    let mut baseline: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(baseline["presets"]["default"]["floor_clearance_mm"]["tolerance"], 3.0);

    // 2 mm of floor drift sits inside a 3 mm band but outside the default.
    baseline["presets"]["default"]["floor_clearance_mm"]["baseline"] = serde_json::json!(6.0);
    fs::write(&path, baseline.to_string()).unwrap();
    validate(root, &[]).assert().code(0).stdout(contains("OVERALL: PASS"));

    validate(root, &["--write-baseline"]).assert().code(0);
    let mut baseline: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(baseline["presets"]["default"]["floor_clearance_mm"]["tolerance"], 0.5);
    baseline["presets"]["default"]["floor_clearance_mm"]["baseline"] = serde_json::json!(6.0);
    fs::write(&path, baseline.to_string()).unwrap();
    validate(root, &[]).assert().code(1).stdout(contains("DRIFT default/floor_clearance_mm"));
}

#[test]
fn strict_preset_and_threshold_flags_reach_the_report() {
    let dir = project();
    let root = dir.path();
    validate(
        root,
        &[
            "--strict",
            "--allow-drift",
            "--min-wall-thickness-mm",
            "1.0",
            "--max-risky-overhang-ratio",
            "0.9",
            "--corridor-samples",
            "5",
            "--thickness-percentile",
            "10",
        ],
    )
    .assert()
    .code(0);
    let json = report(root);
    let thresholds = &json["provenance"]["thresholds"];
    assert_eq!(thresholds["floor_clearance_min_mm"], 3.0);
    assert_eq!(thresholds["frame_min_gap_mm"], 0.25);
    assert_eq!(thresholds["min_wall_thickness_mm"], 1.0);
    assert_eq!(thresholds["max_overhang_ratio"], 0.9);
    assert_eq!(json["provenance"]["sampling"]["corridor_samples"], 5);
    assert_eq!(json["provenance"]["sampling"]["thickness_percentile"], 10.0);

    // Strict floor limit plus a tighter one flips the verdict.
    validate(root, &["--strict", "--allow-drift", "--floor-clearance-min-mm", "4.5"])
        .assert()
        .code(1)
        .stdout(contains("gate floor_clearance failed in default:neutral"));
}

#[test]
fn full_profile_surfaces_every_failing_scenario() {
    let dir = project();
    let root = dir.path();
    validate(root, &["--profile", "full", "--allow-drift"])
        .assert()
        .code(1)
        .stdout(contains("FAIL default:perturb:thin_floor"))
        .stdout(contains("FAIL deep_floor:perturb:thin_floor"))
        .stdout(contains("PASS deep_floor:neutral"));
    assert_eq!(report(root)["scenarios"].as_array().unwrap().len(), 4);
}

#[test]
fn lock_violation_exits_3_without_report() {
    let dir = project();
    let root = dir.path();
    fs::write(
        root.join("fitgate/interface_lock.scad"),
        LOCK_SOURCE.replace("REFERENCE_PIVOT_Y = 33;", "REFERENCE_PIVOT_Y = 33.5;"),
    )
    .unwrap();
    validate(root, &[])
        .assert()
        .code(3)
        .stderr(contains("REFERENCE_PIVOT_Y"));
    assert!(!root.join("out/report.json").exists());
}

#[test]
fn bad_configuration_exits_2() {
    let dir = project();
    let root = dir.path();
    fs::write(
        root.join("fitgate/sweep_config.json"),
        r#"{ "profiles": { "quick": { "presets": [] } } }"#,
    )
    .unwrap();
    validate(root, &[]).assert().code(2);

    let dir = project();
    validate(dir.path(), &["--presets", "no_such_preset"]).assert().code(2);
    validate(dir.path(), &["--min-wall-thickness-mm=-1"]).assert().code(2);
    validate(dir.path(), &["--signature-relative-band=-0.1"]).assert().code(2);
    validate(dir.path(), &["--kinematic-angle-min-deg", "10", "--kinematic-angle-max-deg", "-10"])
        .assert()
        .code(2);
    validate(dir.path(), &["--thickness-percentile", "150"]).assert().code(2);
    // Without --procedural a generator.json is required.
    fitgate()
        .arg("validate")
        .arg("--project-root")
        .arg(dir.path())
        .arg("--output")
        .arg(dir.path().join("r.json"))
        .assert()
        .code(2);
}

#[test]
fn stale_report_is_unknown() {
    let dir = project();
    let root = dir.path();
    validate(root, &["--write-baseline"]).assert().code(0);
    fs::write(root.join("fitgate/sweep_config.json"), SWEEP_CONFIG.replace("quick", "fast")).unwrap();
    fitgate()
        .arg("check-report")
        .arg("--project-root")
        .arg(root)
        .arg("--report")
        .arg(root.join("out/report.json"))
        .assert()
        .code(0)
        .stdout(contains("UNKNOWN: report is stale"));
}
