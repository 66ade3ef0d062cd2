//! Remote access to the guest: target resolution and the protocol seams.
//!
//! Protocol implementations (shell, remote management) live outside this
//! crate and plug in through [`Connector`] and [`ProvisionHook`].
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_model::constants::{STATE_FORWARDING_HOST, STATE_FORWARDING_PORT, STATE_IP};
use kvb_model::{CommType, config::CommConfig};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum CommError {
    #[error("connect to {target} failed: {reason}")]
    Connect { target: String, reason: String },

    #[error("provisioning failed: {0}")]
    Provision(String),
}

impl From<CommError> for StepError {
    fn from(e: CommError) -> Self {
        StepError::Failed(e.to_string())
    }
}

/// Everything a connector needs to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub protocol: CommType,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub private_key_file: Option<PathBuf>,
}

impl ConnectTarget {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Established session to the guest.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    fn target(&self) -> &ConnectTarget;

    /// Runs a command and returns its exit status.
    async fn execute(&self, command: &str) -> Result<i32, CommError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &ConnectTarget) -> Result<Arc<dyn RemoteSession>, CommError>;
}

/// Caller-supplied provisioning run over the connected session.
#[async_trait]
pub trait ProvisionHook: Send + Sync {
    async fn provision(
        &self,
        session: Arc<dyn RemoteSession>,
        cancel: &CancellationToken,
    ) -> Result<(), CommError>;
}

/// Host to connect to: tunnel endpoint, then static host, then the
/// discovered guest address.
pub fn comm_host(comm: &CommConfig, state: &StateBag) -> Result<String, StepError> {
    if let Some(host) = state.get_str(STATE_FORWARDING_HOST) {
        return Ok(host.to_string());
    }
    if let Some(host) = comm.host() {
        return Ok(host.to_string());
    }
    if let Some(ip) = state.get_str(STATE_IP) {
        return Ok(ip.to_string());
    }
    Err(StepError::Failed(
        "no host to connect to: no forwarding, static host or discovered address".to_string(),
    ))
}

/// Port to connect to: tunnel endpoint, then the configured guest port.
pub fn comm_port(comm: &CommConfig, state: &StateBag) -> u16 {
    match state.get::<u16>(STATE_FORWARDING_PORT) {
        Some(port) if *port != 0 => *port,
        _ => comm.port(),
    }
}

/// Resolves the full connect target of the active protocol.
pub fn connect_target(comm: &CommConfig, state: &StateBag) -> Result<ConnectTarget, StepError> {
    Ok(ConnectTarget {
        protocol: comm.communicator,
        host: comm_host(comm, state)?,
        port: comm_port(comm, state),
        username: comm.username().map(str::to_string),
        password: comm.password().map(str::to_string),
        private_key_file: match comm.communicator {
            CommType::Ssh => comm.ssh_private_key_file.clone(),
            _ => None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comm() -> CommConfig {
        CommConfig {
            ssh_host: Some("static.example".into()),
            ssh_port: 2222,
            ..Default::default()
        }
    }

    #[test]
    fn forwarding_wins_over_static_and_discovered() {
        let mut state = StateBag::new();
        state.put(STATE_IP, "10.0.0.9".to_string());
        state.put(STATE_FORWARDING_HOST, "127.0.0.1".to_string());
        state.put(STATE_FORWARDING_PORT, 40022u16);

        assert_eq!(comm_host(&comm(), &state).unwrap(), "127.0.0.1");
        assert_eq!(comm_port(&comm(), &state), 40022);
    }

    #[test]
    fn static_host_wins_over_discovered() {
        let mut state = StateBag::new();
        state.put(STATE_IP, "10.0.0.9".to_string());

        assert_eq!(comm_host(&comm(), &state).unwrap(), "static.example");
        assert_eq!(comm_port(&comm(), &state), 2222);
    }

    #[test]
    fn discovered_address_is_last_resort() {
        let mut state = StateBag::new();
        state.put(STATE_IP, "[fd10::2]".to_string());

        let target = connect_target(&CommConfig::default(), &state).unwrap();
        assert_eq!(target.host, "[fd10::2]");
        assert_eq!(target.endpoint(), "[fd10::2]:0");
    }

    #[test]
    fn no_source_is_an_error() {
        assert!(comm_host(&CommConfig::default(), &StateBag::new()).is_err());
    }
}
