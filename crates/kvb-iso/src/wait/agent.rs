use std::sync::Arc;
use std::time::Duration;

use kvb_core::cluster::VirtClient;
use kvb_core::error::StepError;
use kvb_model::config::poll_interval;
use kvb_model::constants::CONDITION_AGENT_CONNECTED;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Polls an instance until its guest agent reports itself connected.
pub struct AgentWorker {
    pub client: Arc<dyn VirtClient>,
    pub namespace: String,
    pub name: String,
    /// Overall wait; only used to size the polling interval.
    pub window: Duration,
}

impl AgentWorker {
    pub fn spawn(self, cancel: CancellationToken) -> oneshot::Receiver<Result<(), StepError>> {
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            let res = tokio::select! {
                res = self.poll() => res,
                _ = cancel.cancelled() => Err(StepError::cancelled("Guest Agent")),
            };
            let _ = done_tx.send(res);
        });

        done_rx
    }

    async fn poll(&self) -> Result<(), StepError> {
        let mut ticker = tokio::time::interval(poll_interval(self.window));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let vmi = self.client.get_vmi(&self.namespace, &self.name).await?;
            if vmi.status.condition_is_true(CONDITION_AGENT_CONNECTED) {
                return Ok(());
            }
            debug!("looping waiting for guest agent");
        }
    }
}
