use fit_validators::ConfigError;
use golden_signature::SignatureError;
use interface_lock::LockLoadError;
use mesh_export::ExportError;
use sweep_engine::SweepError;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("bench setup failed: {0}")]
    Setup(#[from] std::io::Error),

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

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("assertion failed: {detail}")]
    AssertionFailed { detail: String },
}
