use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kvb_core::cluster::VirtClient;
use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_core::step::{Step, StepAction};
use kvb_model::BuildConfig;
use kvb_model::boot::{BootEvent, parse_boot_command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::steps::{pause, race};

/// Types the boot command on the machine's console.
pub struct StepBootCommand {
    config: Arc<BuildConfig>,
    client: Arc<dyn VirtClient>,
}

impl StepBootCommand {
    pub fn new(config: Arc<BuildConfig>, client: Arc<dyn VirtClient>) -> Self {
        Self { config, client }
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<(), StepError> {
        let script = self.config.boot_command_text();
        if script.is_empty() {
            debug!("no boot command configured");
            return Ok(());
        }
        let events = parse_boot_command(&script)?;

        if self.config.boot_wait_ms > 0 {
            let wait = Duration::from_millis(self.config.boot_wait_ms);
            info!(?wait, "waiting before typing boot command");
            pause(cancel, "boot", wait).await?;
        }

        let ns = &self.config.namespace;
        let name = &self.config.vm_name;
        let mut keyboard = race(cancel, "console", self.client.open_keyboard(ns, name)).await?;
        let interval = Duration::from_millis(self.config.boot_key_interval_ms);

        info!(events = events.len(), "typing boot command");
        for event in events {
            match event {
                BootEvent::Key { key, action } => {
                    race(cancel, "boot command", keyboard.send(key, action)).await?;
                    pause(cancel, "boot command", interval).await?;
                }
                BootEvent::Wait(dur) => {
                    debug!(?dur, "boot command wait");
                    pause(cancel, "boot command", dur).await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Step for StepBootCommand {
    fn name(&self) -> &'static str {
        "boot-command"
    }

    async fn run(&self, cancel: &CancellationToken, _state: &mut StateBag) -> StepAction {
        self.execute(cancel).await.into()
    }
}
