use std::path::PathBuf;

/// Why a mesh cannot be trusted for geometric queries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityIssue {
    #[error("mesh has no triangles")]
    Empty,

    #[error("{count} vertices have non-finite coordinates")]
    NonFinite { count: usize },

    #[error("{count} edges are not shared by exactly two triangles")]
    OpenEdges { count: usize },

    #[error("mesh has {count} disconnected components")]
    MultipleComponents { count: usize },
}

/// Errors from geometric queries.
///
/// `MeshIntegrity` means the input cannot be measured at all. It is never
/// returned for a mesh that was measured and found lacking.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("mesh integrity error on `{label}`: {issue}")]
    MeshIntegrity { label: String, issue: IntegrityIssue },

    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },
}

impl QueryError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, QueryError::MeshIntegrity { .. })
    }
}

/// Errors from reading or assembling a mesh.
#[derive(Debug, thiserror::Error)]
pub enum MeshLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("STL parse error: {reason}")]
    Parse { reason: String },

    #[error("mesh has no usable triangles")]
    Empty,

    #[error("index {index} out of range (vertex count = {vertex_count})")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}
