use std::sync::Arc;

use async_trait::async_trait;
use kvb_core::cluster::{ClusterError, VirtClient};
use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_core::step::{Step, StepAction};
use kvb_model::BuildConfig;
use kvb_model::resource::DataVolumePhase;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::steps::race;

/// Checks that the installation ISO volume exists and finished importing.
pub struct StepValidateIsoVolume {
    config: Arc<BuildConfig>,
    client: Arc<dyn VirtClient>,
}

impl StepValidateIsoVolume {
    pub fn new(config: Arc<BuildConfig>, client: Arc<dyn VirtClient>) -> Self {
        Self { config, client }
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<(), StepError> {
        let ns = &self.config.namespace;
        let name = &self.config.iso_volume_name;
        info!(namespace = %ns, name = %name, "validating ISO data volume");

        let dv = match race(cancel, "ISO data volume lookup", self.client.get_data_volume(ns, name)).await {
            Err(StepError::Cluster(ClusterError::NotFound { .. })) => {
                return Err(StepError::Failed(format!(
                    "ISO data volume {ns}/{name} does not exist"
                )));
            }
            other => other?,
        };

        if dv.phase() != DataVolumePhase::Succeeded {
            return Err(StepError::Failed(format!(
                "ISO data volume {ns}/{name} is not ready (phase {:?})",
                dv.phase()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Step for StepValidateIsoVolume {
    fn name(&self) -> &'static str {
        "validate-iso-volume"
    }

    async fn run(&self, cancel: &CancellationToken, _state: &mut StateBag) -> StepAction {
        self.execute(cancel).await.into()
    }
}
