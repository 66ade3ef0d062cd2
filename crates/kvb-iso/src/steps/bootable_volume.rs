use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kvb_core::cluster::VirtClient;
use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_core::step::{Step, StepAction};
use kvb_model::BuildConfig;
use kvb_model::constants::STATE_BOOTABLE_VOLUME_NAME;
use kvb_model::resource::DataVolumePhase;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::resources;
use crate::steps::{POLL_INTERVAL, poll_until, race};

/// Clones the stopped machine's root disk into the image volume and
/// publishes it as a reusable data source.
///
/// The produced objects are the build's artifact, so there is no cleanup.
pub struct StepCreateBootableVolume {
    config: Arc<BuildConfig>,
    client: Arc<dyn VirtClient>,
}

impl StepCreateBootableVolume {
    pub fn new(config: Arc<BuildConfig>, client: Arc<dyn VirtClient>) -> Self {
        Self { config, client }
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<(), StepError> {
        let volume = resources::bootable_volume(&self.config)?;
        let ns = self.config.namespace.as_str();
        let name = self.config.name.as_str();

        info!(namespace = ns, name, "creating bootable volume");
        race(cancel, "bootable volume creation", self.client.create_data_volume(&volume)).await?;

        let client = &self.client;
        poll_until(
            cancel,
            "bootable volume",
            POLL_INTERVAL,
            Duration::from_millis(self.config.volume_wait_timeout_ms),
            || async move {
                let dv = client.get_data_volume(ns, name).await?;
                match dv.phase() {
                    DataVolumePhase::Succeeded => Ok(true),
                    DataVolumePhase::Failed => Err(StepError::Failed(format!(
                        "bootable volume {ns}/{name} clone failed"
                    ))),
                    phase => {
                        debug!(?phase, progress = ?dv.status.progress.as_deref(), "cloning root disk");
                        Ok(false)
                    }
                }
            },
        )
        .await?;

        info!(namespace = ns, name, "creating DataSource");
        race(
            cancel,
            "DataSource creation",
            self.client.create_data_source(&resources::data_source(&self.config)),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Step for StepCreateBootableVolume {
    fn name(&self) -> &'static str {
        "create-bootable-volume"
    }

    async fn run(&self, cancel: &CancellationToken, state: &mut StateBag) -> StepAction {
        match self.execute(cancel).await {
            Ok(()) => {
                info!(name = %self.config.name, "bootable volume ready");
                state.put(STATE_BOOTABLE_VOLUME_NAME, self.config.name.clone());
                StepAction::Continue
            }
            Err(e) => StepAction::Halt(e),
        }
    }
}
