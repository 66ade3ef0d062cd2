//! Unit of work of a build: a forward action and its reverse.
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::state::StateBag;

/// Result of a step's forward action.
#[derive(Debug)]
pub enum StepAction {
    /// Proceed with the next step.
    Continue,
    /// Stop the build; executed steps are cleaned up in reverse order.
    Halt(StepError),
}

impl StepAction {
    pub fn is_continue(&self) -> bool {
        matches!(self, StepAction::Continue)
    }
}

impl<E: Into<StepError>> From<Result<(), E>> for StepAction {
    fn from(res: Result<(), E>) -> Self {
        match res {
            Ok(()) => StepAction::Continue,
            Err(e) => StepAction::Halt(e.into()),
        }
    }
}

/// One stage of a build.
///
/// `run` receives the build-wide cancellation token and must return promptly
/// once it fires. `cleanup` is best-effort: it runs regardless of
/// cancellation and its error is logged by the runner, never escalated.
#[async_trait]
pub trait Step: Send + Sync {
    /// Step name used in logs, metrics and the terminal error.
    fn name(&self) -> &'static str;

    async fn run(&self, cancel: &CancellationToken, state: &mut StateBag) -> StepAction;

    async fn cleanup(&self, _state: &mut StateBag) -> Result<(), StepError> {
        Ok(())
    }
}
