use std::time::Duration;

use kvb_model::ModelError;
use thiserror::Error;

use crate::cluster::ClusterError;

/// Why a step halted (or why its cleanup failed).
#[derive(Debug, Error)]
pub enum StepError {
    #[error("configuration error: {0}")]
    Config(#[from] ModelError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("{what} wait timeout exceeded ({after:?})")]
    Timeout { what: String, after: Duration },

    #[error("{what} wait cancelled")]
    Cancelled { what: String },

    /// The build was cancelled before this step did any work.
    #[error("build cancelled before the step started")]
    NotStarted,

    #[error("root volume name is empty: the virtual machine name is not set")]
    EmptyRootVolume,

    #[error("{0}")]
    Failed(String),
}

impl StepError {
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        StepError::Timeout {
            what: what.into(),
            after,
        }
    }

    pub fn cancelled(what: impl Into<String>) -> Self {
        StepError::Cancelled { what: what.into() }
    }

    /// Stable category used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::Config(_) => "config",
            StepError::Cluster(_) => "cluster",
            StepError::Timeout { .. } => "timeout",
            StepError::Cancelled { .. } | StepError::NotStarted => "cancelled",
            StepError::EmptyRootVolume => "precondition",
            StepError::Failed(_) => "failed",
        }
    }
}

/// Terminal failure of a run: the step that halted and its reason.
#[derive(Debug, Error)]
#[error("step '{step}' halted: {source}")]
pub struct Halted {
    pub step: &'static str,
    #[source]
    pub source: StepError,
}
