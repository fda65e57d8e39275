use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "fitgate", version, about = "Mesh fit and kinematics gate")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Export, validate and gate every scenario, writing a fresh report.
    Validate(ValidateArgs),
    /// Read an existing report; UNKNOWN unless it is provably fresh.
    CheckReport(CheckReportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long, default_value = ".")]
    pub project_root: PathBuf,
    #[arg(long)]
    pub output: PathBuf,
    /// Sweep profile name; defaults to `quick` with --quick, else `full`.
    #[arg(long)]
    pub profile: Option<String>,
    /// Reduced sampling and the quick profile.
    #[arg(long)]
    pub quick: bool,
    /// Replace the profile's preset list.
    #[arg(long, num_args = 1..)]
    pub presets: Vec<String>,
    /// Downgrade signature drift to an advisory (also FITGATE_ALLOW_DRIFT).
    #[arg(long)]
    pub allow_drift: bool,
    /// Commit live signatures as the new baseline instead of comparing.
    #[arg(long)]
    pub write_baseline: bool,
    /// Fractional drift band for volume and area, applied on commit.
    #[arg(long)]
    pub signature_relative_band: Option<f64>,
    /// Drift band for length metrics, applied on commit.
    #[arg(long)]
    pub signature_absolute_band_mm: Option<f64>,

    /// Start from the release-candidate limits instead of the defaults.
    #[arg(long)]
    pub strict: bool,
    #[arg(long)]
    pub floor_clearance_min_mm: Option<f64>,
    #[arg(long)]
    pub corridor_clearance_min_mm: Option<f64>,
    #[arg(long)]
    pub frame_min_gap_mm: Option<f64>,
    #[arg(long)]
    pub min_wall_thickness_mm: Option<f64>,
    /// Largest allowed share of downward-facing area steeper than the overhang angle.
    #[arg(long)]
    pub max_risky_overhang_ratio: Option<f64>,
    #[arg(long)]
    pub overhang_angle_deg: Option<f64>,
    #[arg(long)]
    pub min_contact_area_mm2: Option<f64>,
    #[arg(long)]
    pub min_contact_span_x_mm: Option<f64>,
    #[arg(long)]
    pub min_contact_span_y_mm: Option<f64>,

    #[arg(long)]
    pub angle_step_deg: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub kinematic_angle_min_deg: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub kinematic_angle_max_deg: Option<f64>,
    /// Sample positions along each insertion corridor.
    #[arg(long)]
    pub corridor_samples: Option<usize>,
    #[arg(long)]
    pub thickness_probes: Option<usize>,
    /// Fewer valid thickness probes than this is a failure.
    #[arg(long)]
    pub thickness_min_valid: Option<usize>,
    /// Percentile of probe thicknesses judged against the minimum.
    #[arg(long)]
    pub thickness_percentile: Option<f64>,
    /// Thickness probes thinner than this are discarded as noise.
    #[arg(long)]
    pub thickness_noise_floor_mm: Option<f64>,
    /// Height above the body's lowest point that still counts as bed contact.
    #[arg(long)]
    pub contact_tolerance_mm: Option<f64>,
    /// Smallest body change every perturbation must cause.
    #[arg(long)]
    pub min_shape_delta: Option<f64>,

    /// Stop scheduling scenarios after the first failure.
    #[arg(long)]
    pub fail_fast: bool,
    /// Worker threads; defaults to available cores.
    #[arg(long)]
    pub jobs: Option<usize>,
    /// Use the built-in procedural fixture instead of generator.json.
    #[arg(long)]
    pub procedural: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckReportArgs {
    #[arg(long, default_value = ".")]
    pub project_root: PathBuf,
    #[arg(long)]
    pub report: PathBuf,
}
