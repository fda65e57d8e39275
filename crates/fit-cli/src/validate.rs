//! `fitgate validate`: always a fresh run, never a cached verdict.

use fit_report::{inputs_hash, render_summary, FullValidationReport, Provenance};
use fit_validators::{FitThresholds, SamplingConfig};
use golden_signature::{
    commit_baseline, compare, BaselineFile, DriftOverride, DriftReport, Provenance as BaselineProvenance,
    ToleranceBands,
};
use mesh_export::ExportCache;
use sweep_engine::{Orchestrator, SweepOptions};
use tracing::{info, warn};

use crate::cli::ValidateArgs;
use crate::error::{CliError, EXIT_GATE_FAILURE, EXIT_PASS};
use crate::project::ProjectLayout;

fn thresholds(args: &ValidateArgs) -> Result<FitThresholds, CliError> {
    let base = if args.strict {
        FitThresholds::strict()
    } else {
        FitThresholds::default()
    };
    let mut builder = base.to_builder();
    if let Some(v) = args.floor_clearance_min_mm {
        builder = builder.floor_clearance_min_mm(v);
    }
    if let Some(v) = args.corridor_clearance_min_mm {
        builder = builder.corridor_min_clearance_mm(v);
    }
    if let Some(v) = args.frame_min_gap_mm {
        builder = builder.frame_min_gap_mm(v);
    }
    if let Some(v) = args.min_wall_thickness_mm {
        builder = builder.min_wall_thickness_mm(v);
    }
    if args.max_risky_overhang_ratio.is_some() || args.overhang_angle_deg.is_some() {
        builder = builder.max_overhang(
            args.max_risky_overhang_ratio.unwrap_or(base.max_overhang_ratio()),
            args.overhang_angle_deg.unwrap_or(base.overhang_angle_deg()),
        );
    }
    if args.min_contact_area_mm2.is_some() || args.min_contact_span_x_mm.is_some() || args.min_contact_span_y_mm.is_some()
    {
        let (span_x, span_y) = base.min_contact_span_mm();
        builder = builder.min_contact(
            args.min_contact_area_mm2.unwrap_or(base.min_contact_area_mm2()),
            args.min_contact_span_x_mm.unwrap_or(span_x),
            args.min_contact_span_y_mm.unwrap_or(span_y),
        );
    }
    Ok(builder.build()?)
}

fn sampling(args: &ValidateArgs) -> Result<SamplingConfig, CliError> {
    let mut sampling = if args.quick {
        SamplingConfig::quick()
    } else {
        SamplingConfig::default()
    };
    if let Some(step) = args.angle_step_deg {
        sampling = sampling.with_angle_step(step);
    }
    if args.kinematic_angle_min_deg.is_some() || args.kinematic_angle_max_deg.is_some() {
        let min = args.kinematic_angle_min_deg.unwrap_or(sampling.angle_min_deg);
        let max = args.kinematic_angle_max_deg.unwrap_or(sampling.angle_max_deg);
        sampling = sampling.with_angle_range(min, max);
    }
    if let Some(samples) = args.corridor_samples {
        sampling = sampling.with_corridor_samples(samples);
    }
    sampling.thickness_probes = args.thickness_probes.unwrap_or(sampling.thickness_probes);
    sampling.thickness_min_valid = args.thickness_min_valid.unwrap_or(sampling.thickness_min_valid);
    sampling.thickness_percentile = args.thickness_percentile.unwrap_or(sampling.thickness_percentile);
    sampling.thickness_noise_floor_mm = args.thickness_noise_floor_mm.unwrap_or(sampling.thickness_noise_floor_mm);
    sampling.contact_tolerance_mm = args.contact_tolerance_mm.unwrap_or(sampling.contact_tolerance_mm);
    sampling.validate()?;
    Ok(sampling)
}

fn non_negative(name: &'static str, value: f64) -> Result<f64, CliError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(CliError::InvalidArgument { name, value })
    }
}

fn bands(args: &ValidateArgs) -> Result<ToleranceBands, CliError> {
    let defaults = ToleranceBands::default();
    Ok(ToleranceBands {
        relative: non_negative(
            "signature-relative-band",
            args.signature_relative_band.unwrap_or(defaults.relative),
        )?,
        absolute_mm: non_negative(
            "signature-absolute-band-mm",
            args.signature_absolute_band_mm.unwrap_or(defaults.absolute_mm),
        )?,
    })
}

fn options(args: &ValidateArgs) -> Result<SweepOptions, CliError> {
    let mut options = SweepOptions::default().with_fail_fast(args.fail_fast);
    if let Some(jobs) = args.jobs {
        options = options.with_jobs(jobs);
    }
    if let Some(delta) = args.min_shape_delta {
        options = options.with_min_shape_delta(non_negative("min-shape-delta", delta)?);
    }
    Ok(options)
}

fn committer() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{user} via fitgate validate --write-baseline")
}

/// Run the sweep, apply the drift policy, write the report and print the
/// summary. Returns the process exit code.
pub fn run(args: &ValidateArgs) -> Result<u8, CliError> {
    let layout = ProjectLayout::open(&args.project_root)?;
    let lock = layout.load_lock()?;
    let thresholds = thresholds(args)?;
    let sampling = sampling(args)?;
    let bands = bands(args)?;
    let options = options(args)?;
    let profile = layout.sweep_profile(args.profile.as_deref(), args.quick, &args.presets)?;
    let (generator, generator_name, sources) = layout.generator(args.procedural)?;
    let cache = ExportCache::new(layout.cache_dir(), generator)?;

    let outcome = Orchestrator::new(&lock, &cache, sampling.clone(), thresholds.clone())?.run(&profile, &options)?;

    let allow = DriftOverride::from_env(args.allow_drift);
    let baseline_path = layout.baseline_path();
    let drift = if args.write_baseline {
        if !outcome.all_pass() {
            warn!("committing a baseline from a run with failing scenarios");
        }
        commit_baseline(
            &baseline_path,
            &outcome.signatures,
            bands,
            BaselineProvenance {
                committed_by: committer(),
                source_fingerprint: cache.fingerprint().to_string(),
            },
        )?;
        DriftReport::committed(outcome.signatures.clone(), allow)
    } else {
        let baseline = BaselineFile::load(&baseline_path)?;
        compare(baseline.as_ref(), &outcome.signatures, &profile.presets, allow)
    };

    // Hashed after a commit so the report covers the baseline it wrote.
    let inputs = layout.inputs(&sources);
    let provenance = Provenance {
        source_root: layout.root().to_path_buf(),
        source_fingerprint: cache.fingerprint().to_string(),
        inputs_hash: inputs_hash(layout.root(), &inputs)?,
        inputs,
        generator: generator_name,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        lock_values: lock.named_values(),
        lock_fingerprint: lock.fingerprint(),
        thresholds,
        sampling,
        sweep_profile: profile,
    };
    let report = FullValidationReport::new(provenance, outcome, drift);
    report.write(&args.output)?;
    print!("{}", render_summary(&report));

    info!(overall_pass = report.overall_pass, output = %args.output.display(), "validation finished");
    Ok(if report.overall_pass {
        EXIT_PASS
    } else {
        EXIT_GATE_FAILURE
    })
}
