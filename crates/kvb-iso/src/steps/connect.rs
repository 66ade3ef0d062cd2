use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_core::step::{Step, StepAction};
use kvb_model::BuildConfig;
use kvb_model::constants::STATE_COMMUNICATOR;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::comm::{ConnectTarget, Connector, RemoteSession, connect_target};
use crate::steps::POLL_INTERVAL;

/// Opens a remote session to the guest, retrying until the protocol's
/// timeout elapses.
pub struct StepConnect {
    config: Arc<BuildConfig>,
    connector: Arc<dyn Connector>,
}

impl StepConnect {
    pub fn new(config: Arc<BuildConfig>, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    async fn connect(
        &self,
        cancel: &CancellationToken,
        target: &ConnectTarget,
    ) -> Result<Arc<dyn RemoteSession>, StepError> {
        let timeout = Duration::from_millis(self.config.comm.timeout_ms());
        let deadline = Instant::now() + timeout;
        let what = self.config.comm.communicator.as_str();

        loop {
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StepError::cancelled(what)),
                _ = tokio::time::sleep_until(deadline) => return Err(StepError::timeout(what, timeout)),
                res = self.connector.connect(target) => res,
            };
            match attempt {
                Ok(session) => return Ok(session),
                Err(e) => debug!(error = %e, "connect attempt failed, retrying"),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StepError::cancelled(what)),
                _ = tokio::time::sleep_until(deadline) => return Err(StepError::timeout(what, timeout)),
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }
    }
}

#[async_trait]
impl Step for StepConnect {
    fn name(&self) -> &'static str {
        "connect"
    }

    async fn run(&self, cancel: &CancellationToken, state: &mut StateBag) -> StepAction {
        let target = match connect_target(&self.config.comm, state) {
            Ok(target) => target,
            Err(e) => return StepAction::Halt(e),
        };
        info!(protocol = %target.protocol, endpoint = target.endpoint(), "connecting to guest");

        match self.connect(cancel, &target).await {
            Ok(session) => {
                info!("connected to guest");
                state.put(STATE_COMMUNICATOR, session);
                StepAction::Continue
            }
            Err(e) => StepAction::Halt(e),
        }
    }
}
