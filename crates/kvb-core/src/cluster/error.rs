use thiserror::Error;

/// Failure of a control-plane call.
///
/// `NotFound` is kept apart from every other failure: several waits treat a
/// missing object as progress (e.g. a stopped instance disappearing).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("control-plane request failed: {0}")]
    Api(String),

    #[error("stream error: {0}")]
    Stream(String),
}

impl ClusterError {
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        ClusterError::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }
}

pub type ClusterResult<T> = Result<T, ClusterError>;
