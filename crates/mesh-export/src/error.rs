use std::path::PathBuf;

use fit_types::PartKind;
use mesh_query::MeshLoadError;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export of {part} exited with status {code:?}: {stderr_tail}")]
    Failed {
        part: PartKind,
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error("export of {part} timed out after {seconds:.1}s")]
    Timeout { part: PartKind, seconds: f64 },

    #[error("export produced no output at {path}")]
    EmptyOutput { path: PathBuf },

    #[error("exported mesh could not be loaded: {0}")]
    Mesh(#[from] MeshLoadError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown preset `{0}`")]
    UnknownPreset(String),

    #[error("invalid export request: {0}")]
    InvalidRequest(String),
}

impl ExportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExportError::Timeout { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.into(),
            source,
        }
    }
}
