use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid baseline file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("baseline {path} has schema {found}, expected {expected}")]
    Schema {
        path: PathBuf,
        found: String,
        expected: &'static str,
    },

    #[error("another baseline commit holds {lock}")]
    Locked { lock: PathBuf },

    #[error("no live signatures to commit")]
    NothingToCommit,
}

impl SignatureError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
