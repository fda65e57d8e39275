use std::path::PathBuf;

use fit_validators::ConfigError;
use interface_lock::LockViolationError;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// Fatal for the whole run.
    #[error(transparent)]
    Lock(#[from] LockViolationError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid sweep config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("sweep profile `{profile}`: {reason}")]
    Profile { profile: String, reason: String },

    #[error("sweep profile `{0}` is not defined")]
    UnknownProfile(String),

    #[error("generator has no preset named {}", .0.join(", "))]
    UnknownPresets(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl SweepError {
    pub fn is_lock_violation(&self) -> bool {
        matches!(self, SweepError::Lock(_))
    }
}
