use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kvb_core::cluster::VirtClient;
use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_core::step::{Step, StepAction};
use kvb_model::BuildConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::steps::{POLL_INTERVAL, poll_until, race};

/// Shuts the machine down and waits until its instance is gone, so the
/// root disk is quiescent before it gets cloned.
pub struct StepStopVirtualMachine {
    config: Arc<BuildConfig>,
    client: Arc<dyn VirtClient>,
}

impl StepStopVirtualMachine {
    pub fn new(config: Arc<BuildConfig>, client: Arc<dyn VirtClient>) -> Self {
        Self { config, client }
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<(), StepError> {
        let ns = self.config.namespace.as_str();
        let name = self.config.vm_name.as_str();

        info!(namespace = ns, name, "stopping VirtualMachine");
        race(cancel, "VirtualMachine stop", self.client.stop_vm(ns, name)).await?;

        let client = &self.client;
        poll_until(
            cancel,
            "VirtualMachine stop",
            POLL_INTERVAL,
            Duration::from_millis(self.config.stop_timeout_ms),
            || async move {
                match client.get_vmi(ns, name).await {
                    Err(e) if e.is_not_found() => Ok(true),
                    Err(e) => Err(e.into()),
                    Ok(vmi) => {
                        debug!(phase = ?vmi.status.phase, "instance still present");
                        Ok(false)
                    }
                }
            },
        )
        .await?;

        info!(namespace = ns, name, "VirtualMachine stopped");
        Ok(())
    }
}

#[async_trait]
impl Step for StepStopVirtualMachine {
    fn name(&self) -> &'static str {
        "stop-virtual-machine"
    }

    async fn run(&self, cancel: &CancellationToken, _state: &mut StateBag) -> StepAction {
        self.execute(cancel).await.into()
    }
}
