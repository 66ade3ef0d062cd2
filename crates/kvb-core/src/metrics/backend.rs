use std::sync::Arc;

use crate::error::StepError;

/// Step execution outcome for metrics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step continued.
    Success,
    /// Step halted on an error.
    Failure,
    /// Step halted on cancellation.
    Canceled,
    /// Step halted on a wait timeout.
    Timeout,
}

impl StepOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            StepOutcome::Success => "success",
            StepOutcome::Failure => "failure",
            StepOutcome::Canceled => "canceled",
            StepOutcome::Timeout => "timeout",
        }
    }
}

impl From<&StepError> for StepOutcome {
    fn from(err: &StepError) -> Self {
        match err {
            StepError::Cancelled { .. } | StepError::NotStarted => StepOutcome::Canceled,
            StepError::Timeout { .. } => StepOutcome::Timeout,
            _ => StepOutcome::Failure,
        }
    }
}

/// Backend metrics collection interface.
///
/// Implementations are injected into the [`crate::runner::Runner`] and
/// called once per step transition.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record the start of a step's forward action.
    ///
    /// # Arguments
    /// - `step`: Step name
    fn record_step_started(&self, step: &str);
    /// Record the end of a step's forward action.
    ///
    /// # Arguments
    /// - `step`: Step name
    /// - `outcome`: How the forward action ended
    /// - `duration_ms`: Execution time in milliseconds
    fn record_step_completed(&self, step: &str, outcome: StepOutcome, duration_ms: u64);
    /// Record a failed cleanup.
    ///
    /// Cleanup failures never fail the build, so this is the only trace
    /// they leave besides the log.
    ///
    /// # Arguments
    /// - `step`: Step name
    /// - `error_kind`: Error category (see [`StepError::kind`])
    fn record_cleanup_error(&self, step: &str, error_kind: &str);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
