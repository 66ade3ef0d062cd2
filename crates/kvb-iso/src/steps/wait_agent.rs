use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kvb_core::cluster::VirtClient;
use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_core::step::{Step, StepAction};
use kvb_model::BuildConfig;
use kvb_model::constants::STATE_GUEST_AGENT;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::wait::AgentWorker;

const WHAT: &str = "Guest Agent";

/// Blocks until the in-guest agent reports itself connected.
pub struct StepWaitForAgent {
    config: Arc<BuildConfig>,
    client: Arc<dyn VirtClient>,
}

impl StepWaitForAgent {
    pub fn new(config: Arc<BuildConfig>, client: Arc<dyn VirtClient>) -> Self {
        Self { config, client }
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<(), StepError> {
        let window = Duration::from_millis(self.config.wait.agent_wait_timeout_ms);
        info!(?window, "waiting for guest agent");

        let worker_token = cancel.child_token();
        let _stop_worker = worker_token.clone().drop_guard();
        let done = AgentWorker {
            client: self.client.clone(),
            namespace: self.config.namespace.clone(),
            name: self.config.vm_name.clone(),
            window,
        }
        .spawn(worker_token);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StepError::cancelled(WHAT)),
            _ = tokio::time::sleep(window) => Err(StepError::timeout(WHAT, window)),
            res = done => match res {
                Ok(res) => res,
                Err(_) => Err(StepError::Failed("guest agent watcher stopped".into())),
            },
        }
    }
}

#[async_trait]
impl Step for StepWaitForAgent {
    fn name(&self) -> &'static str {
        "wait-for-agent"
    }

    async fn run(&self, cancel: &CancellationToken, state: &mut StateBag) -> StepAction {
        if self.config.wait.agent_wait_timeout_ms == 0 {
            return StepAction::Continue;
        }
        match self.execute(cancel).await {
            Ok(()) => {
                info!("guest agent connected");
                state.put(STATE_GUEST_AGENT, true);
                StepAction::Continue
            }
            Err(e) => StepAction::Halt(e),
        }
    }
}
