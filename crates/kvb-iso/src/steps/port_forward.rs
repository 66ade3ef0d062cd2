use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use async_trait::async_trait;
use kvb_core::cluster::PortTarget;
use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_core::step::{Step, StepAction};
use kvb_model::BuildConfig;
use kvb_model::constants::{STATE_FORWARDING_HOST, STATE_FORWARDING_PORT};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::tunnel::{ForwardedPort, ForwarderFactory, Protocol};

/// Local host the tunnel listens on.
pub const FORWARDING_HOST: &str = "127.0.0.1";

/// Opens a tunnel from a local port to the guest's protocol port.
///
/// The relay keeps running after the step completes and stops with the
/// build's cancellation token.
pub struct StepStartPortForward {
    config: Arc<BuildConfig>,
    forwarders: Arc<dyn ForwarderFactory>,
}

impl StepStartPortForward {
    pub fn new(config: Arc<BuildConfig>, forwarders: Arc<dyn ForwarderFactory>) -> Self {
        Self { config, forwarders }
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<u16, StepError> {
        let comm = &self.config.comm;
        let port = ForwardedPort {
            local: comm.local_port(),
            remote: comm.port(),
            protocol: Protocol::Tcp,
        };
        let target = PortTarget::vmi(&self.config.namespace, &self.config.vm_name);
        info!(%target, remote = port.remote, "starting port forwarding");

        let forwarder = self.forwarders.forwarder(target, cancel.child_token());
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let res = forwarder
                .start_forwarding(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
                .await;
            let _ = tx.send(res);
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StepError::cancelled("port forwarding")),
            res = rx => match res {
                Ok(Ok(bound)) => Ok(bound.port()),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(StepError::Failed("port forwarder stopped before binding".into())),
            },
        }
    }
}

#[async_trait]
impl Step for StepStartPortForward {
    fn name(&self) -> &'static str {
        "start-port-forward"
    }

    async fn run(&self, cancel: &CancellationToken, state: &mut StateBag) -> StepAction {
        if self.config.disable_forwarding.is_enabled() || self.config.comm.communicator.is_none() {
            debug!("port forwarding disabled");
            return StepAction::Continue;
        }
        match self.execute(cancel).await {
            Ok(port) => {
                info!(host = FORWARDING_HOST, port, "port forwarding ready");
                state.put(STATE_FORWARDING_HOST, FORWARDING_HOST.to_string());
                state.put(STATE_FORWARDING_PORT, port);
                StepAction::Continue
            }
            Err(e) => StepAction::Halt(e),
        }
    }
}
