use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kvb_core::state::StateBag;
use kvb_core::step::{Step, StepAction};
use kvb_model::BuildConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::steps::pause;

/// Gives the unattended installer its configured time to finish.
pub struct StepWaitForInstallation {
    config: Arc<BuildConfig>,
}

impl StepWaitForInstallation {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Step for StepWaitForInstallation {
    fn name(&self) -> &'static str {
        "wait-for-installation"
    }

    async fn run(&self, cancel: &CancellationToken, _state: &mut StateBag) -> StepAction {
        let wait = Duration::from_millis(self.config.installation_wait_timeout_ms);
        if wait.is_zero() {
            return StepAction::Continue;
        }
        info!(?wait, "waiting for installation to complete");
        pause(cancel, "installation", wait).await.into()
    }
}

#[cfg(test)]
mod tests {
    use kvb_core::error::StepError;

    use super::*;
    use crate::steps::fixtures;

    #[tokio::test(start_paused = true)]
    async fn sleeps_for_the_configured_time() {
        let mut config = fixtures::config();
        config.installation_wait_timeout_ms = 900_000;

        let started = tokio::time::Instant::now();
        let action = StepWaitForInstallation::new(Arc::new(config))
            .run(&CancellationToken::new(), &mut StateBag::new())
            .await;

        assert!(action.is_continue());
        assert_eq!(started.elapsed(), Duration::from_secs(900));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_halts_promptly() {
        let mut config = fixtures::config();
        config.installation_wait_timeout_ms = 900_000;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let action = StepWaitForInstallation::new(Arc::new(config))
            .run(&cancel, &mut StateBag::new())
            .await;

        assert!(matches!(action, StepAction::Halt(StepError::Cancelled { .. })));
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }
}
