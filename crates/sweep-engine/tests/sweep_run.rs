//! Sweeps over the procedural fixture with an isolated cache per test.

use std::path::Path;
use std::sync::Arc;

use fit_types::{CheckStatus, FailureKind, ParamValue, PartKind, ScenarioSpec};
use fit_validators::{checks, FitSuite, FitThresholds, SamplingConfig};
use interface_lock::InterfaceLock;
use mesh_export::{ExportCache, ExportError, ExportRequest, GeometryGenerator, ProceduralGenerator};
use sweep_engine::Perturbation;
use sweep_engine::{Orchestrator, SweepConfig, SweepError, SweepOptions, SweepOutcome, SweepProfile};
use tempfile::TempDir;

const CONFIG: &str = r#"{
    "profiles": {
        "full": {
            "presets": ["default", "wide_trench"],
            "perturbations": [
                { "name": "thin_floor", "overrides": { "cavity_depth_mm": 29.0 } },
                { "name": "deeper", "overrides": { "cavity_depth_mm": 33 } }
            ]
        },
        "broken": {
            "presets": ["default"],
            "perturbations": [{ "name": "typo", "overrides": { "cavity_dept_mm": 30.0 } }]
        }
    }
}"#;

fn profile(name: &str) -> SweepProfile {
    SweepConfig::parse(CONFIG, Path::new("sweep_config.json"))
        .unwrap()
        .profile(name)
        .unwrap()
}

fn fresh_cache(dir: &TempDir) -> ExportCache {
    ExportCache::new(dir.path().join("cache"), Arc::new(ProceduralGenerator::new())).unwrap()
}

fn sweep(
    lock: &InterfaceLock,
    cache: &ExportCache,
    profile: &SweepProfile,
    options: SweepOptions,
) -> Result<SweepOutcome, SweepError> {
    Orchestrator::new(lock, cache, SamplingConfig::quick(), FitThresholds::default())?.run(profile, &options)
}

#[test]
fn one_failing_gate_fails_the_sweep_but_every_scenario_runs() {
    let dir = tempfile::tempdir().unwrap();
    let cache = fresh_cache(&dir);
    let outcome = sweep(
        &InterfaceLock::canonical(),
        &cache,
        &profile("full"),
        SweepOptions::default().with_jobs(4),
    )
    .unwrap();

    let ids: Vec<&str> = outcome.scenarios.iter().map(|s| s.scenario_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "default:neutral",
            "default:perturb:thin_floor",
            "default:perturb:deeper",
            "wide_trench:neutral",
            "wide_trench:perturb:thin_floor",
            "wide_trench:perturb:deeper",
        ]
    );
    assert!(outcome.not_run.is_empty());
    assert!(!outcome.all_pass());

    let gates = outcome.gate_failures();
    assert_eq!(gates.len(), 2);
    assert!(gates.iter().all(|g| g.check_id == checks::FLOOR_CLEARANCE));
    assert_eq!(gates[0].scenario_id, "default:perturb:thin_floor");

    for report in &outcome.scenarios {
        let thin = report.scenario_id.ends_with("thin_floor");
        assert_eq!(report.pass, !thin, "{}", report.scenario_id);
    }
}

#[test]
fn shared_parts_export_once_and_signatures_come_from_neutral() {
    let dir = tempfile::tempdir().unwrap();
    let cache = fresh_cache(&dir);
    let outcome = sweep(
        &InterfaceLock::canonical(),
        &cache,
        &profile("full"),
        SweepOptions::default(),
    )
    .unwrap();

    let frames = outcome.exports.iter().filter(|r| r.part == PartKind::Frame).count();
    let bodies = outcome.exports.iter().filter(|r| r.part == PartKind::Body).count();
    assert_eq!(frames, 1);
    assert_eq!(bodies, 6);

    assert_eq!(outcome.signatures.len(), 2);
    let default = &outcome.signatures["default"];
    assert!((default["floor_clearance_mm"] - 4.0).abs() < 1e-4);
    assert!((default["corridor_min_clearance_mm"] - 0.125).abs() < 1e-4);
    assert_eq!(default["extent_z_mm"], 40.0);

    // A second sweep over the same cache reuses every artifact.
    let again = sweep(
        &InterfaceLock::canonical(),
        &fresh_cache(&dir),
        &profile("full"),
        SweepOptions::default(),
    )
    .unwrap();
    assert!(again.exports.iter().all(|r| r.cache_hit));
    assert_eq!(again.scenarios, outcome.scenarios);
}

#[test]
fn lock_violation_aborts_before_export() {
    let dir = tempfile::tempdir().unwrap();
    let cache = fresh_cache(&dir);
    let mut named = InterfaceLock::canonical().named_values();
    named.insert("REFERENCE_PIVOT_Y".into(), 33.5);
    let lock = InterfaceLock::from_named(&named).unwrap();

    let err = sweep(&lock, &cache, &profile("full"), SweepOptions::default()).unwrap_err();
    assert!(err.is_lock_violation());
    assert!(cache.records().is_empty());
}

#[test]
fn unknown_preset_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let cache = fresh_cache(&dir);
    let profile = profile("full").with_presets(vec!["default".into(), "nope".into()]).unwrap();
    let err = sweep(&InterfaceLock::canonical(), &cache, &profile, SweepOptions::default()).unwrap_err();
    assert!(matches!(err, SweepError::UnknownPresets(ref names) if names == &["nope"]));
}

#[test]
fn export_failure_stays_in_its_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let cache = fresh_cache(&dir);
    let outcome = sweep(
        &InterfaceLock::canonical(),
        &cache,
        &profile("broken"),
        SweepOptions::default(),
    )
    .unwrap();

    let neutral = &outcome.scenarios[0];
    let typo = &outcome.scenarios[1];
    assert!(neutral.pass);
    assert!(!typo.pass);
    assert_eq!(typo.results.len(), 1);
    assert_eq!(typo.results[0].check_id, checks::EXPORT);
    assert_eq!(typo.results[0].failure, Some(FailureKind::Export));
    assert!(typo.results[0].message.contains("cavity_dept_mm"));
    assert!(outcome.gate_failures().is_empty());
}

#[test]
fn fail_fast_stops_scheduling() {
    let dir = tempfile::tempdir().unwrap();
    let cache = fresh_cache(&dir);
    let profile =
        SweepProfile::neutral_only("custom", vec!["default".into(), "wide_trench".into()]).unwrap();
    // A 7.6 mm ball jams every corridor, so the first scenario fails.
    let lock = InterfaceLock::canonical();
    let geometry = lock.fit_geometry().with_ball_diameter(7.6);
    let suite = FitSuite::new(geometry, SamplingConfig::quick(), FitThresholds::default()).unwrap();
    let outcome = Orchestrator::with_suite(&lock, &cache, suite)
        .run(&profile, &SweepOptions::default().with_jobs(1).with_fail_fast(true))
        .unwrap();

    assert_eq!(outcome.scenarios.len(), 1);
    assert_eq!(outcome.not_run, vec!["wide_trench:neutral".to_string()]);
    assert!(!outcome.all_pass());
    assert_eq!(outcome.gate_failures()[0].check_id, checks::INSERTION_CORRIDOR);
}

/// Procedural fixture that drops one override before building the body,
/// as a CAD wrapper would when a parameter is not wired to the model.
struct IgnoresOverride {
    inner: ProceduralGenerator,
    ignored: &'static str,
}

impl GeometryGenerator for IgnoresOverride {
    fn fingerprint(&self) -> String {
        format!("{}-ignores-{}", self.inner.fingerprint(), self.ignored)
    }

    fn generate(&self, request: &ExportRequest, output: &Path) -> Result<(), ExportError> {
        let mut request = request.clone();
        if let Some(scenario) = &request.scenario {
            let mut overrides = scenario.overrides().clone();
            overrides.remove(self.ignored);
            request.scenario = Some(match scenario.perturbation() {
                Some(tag) => ScenarioSpec::perturbed(scenario.preset(), tag, overrides),
                None => ScenarioSpec::neutral(scenario.preset()),
            });
        }
        self.inner.generate(&request, output)
    }

    fn has_preset(&self, preset: &str) -> bool {
        self.inner.has_preset(preset)
    }
}

fn perturbation(name: &str, key: &str, value: f64) -> Perturbation {
    Perturbation {
        name: name.to_string(),
        overrides: [(key.to_string(), ParamValue::Float(value))].into(),
    }
}

#[test]
fn ignored_override_fails_shape_sensitivity() {
    let dir = tempfile::tempdir().unwrap();
    let generator = IgnoresOverride {
        inner: ProceduralGenerator::new(),
        ignored: "trench_half_width_mm",
    };
    let cache = ExportCache::new(dir.path().join("cache"), Arc::new(generator)).unwrap();
    let mut profile = SweepProfile::neutral_only("sensitivity", vec!["default".into()]).unwrap();
    profile.perturbations = vec![
        perturbation("narrow", "trench_half_width_mm", 9.5),
        perturbation("shallow", "cavity_depth_mm", 31.0),
    ];
    let outcome = sweep(&InterfaceLock::canonical(), &cache, &profile, SweepOptions::default()).unwrap();

    let neutral = &outcome.scenarios[0];
    assert!(neutral.pass);
    assert!(neutral.result(checks::SHAPE_SENSITIVITY).is_none());

    // Every fit check passes on the unchanged copy; only sensitivity notices.
    let narrow = &outcome.scenarios[1];
    assert_eq!(narrow.blocking_failures(), vec![checks::SHAPE_SENSITIVITY]);
    let shape = narrow.result(checks::SHAPE_SENSITIVITY).unwrap();
    assert_eq!(shape.measured["max_shape_delta"], 0.0);
    assert!(shape.message.contains("no metric moved"), "{}", shape.message);

    let shallow = outcome.scenarios[2].result(checks::SHAPE_SENSITIVITY).unwrap();
    assert_eq!(shallow.status, CheckStatus::Pass, "{}", shallow.message);
    assert!(shallow.measured["delta_volume_mm3"] > 0.0);

    assert_eq!(
        outcome.gate_failures().iter().map(|g| g.scenario_id.as_str()).collect::<Vec<_>>(),
        vec!["default:perturb:narrow"]
    );
}

#[test]
fn shape_delta_minimum_is_configurable() {
    let dir = tempfile::tempdir().unwrap();
    let cache = fresh_cache(&dir);
    let mut profile = SweepProfile::neutral_only("sensitivity", vec!["default".into()]).unwrap();
    profile.perturbations = vec![perturbation("nudge", "cavity_depth_mm", 32.01)];

    let loose = sweep(&InterfaceLock::canonical(), &cache, &profile, SweepOptions::default()).unwrap();
    let nudge = loose.scenarios[1].result(checks::SHAPE_SENSITIVITY).unwrap();
    assert!(nudge.passed(), "{}", nudge.message);

    let strict = sweep(
        &InterfaceLock::canonical(),
        &cache,
        &profile,
        SweepOptions::default().with_min_shape_delta(1e6),
    )
    .unwrap();
    assert!(strict.scenarios[1].result(checks::SHAPE_SENSITIVITY).unwrap().is_failure());
}
