use fit_report::ReportError;
use fit_validators::ConfigError;
use golden_signature::SignatureError;
use interface_lock::LockLoadError;
use mesh_export::ExportError;
use sweep_engine::SweepError;

pub const EXIT_PASS: u8 = 0;
pub const EXIT_GATE_FAILURE: u8 = 1;
pub const EXIT_USAGE: u8 = 2;
pub const EXIT_LOCK_VIOLATION: u8 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("cannot use project root {path}: {source}")]
    ProjectRoot {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`--{name}` must be finite and non-negative, got {value}")]
    InvalidArgument { name: &'static str, value: f64 },

    #[error(transparent)]
    Lock(#[from] LockLoadError),

    #[error(transparent)]
    Sweep(#[from] SweepError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Sweep(e) if e.is_lock_violation() => EXIT_LOCK_VIOLATION,
            _ => EXIT_USAGE,
        }
    }
}
