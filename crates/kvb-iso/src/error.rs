use std::{io, net::SocketAddr};

use kvb_core::error::StepError;
use kvb_model::{CommType, ModelError, ResourceRef};
use thiserror::Error;

/// Terminal failure of [`crate::Builder`].
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ModelError),

    #[error("builder used before prepare()")]
    NotPrepared,

    #[error("no connector available for communicator '{0}'")]
    MissingConnector(CommType),

    #[error("build halted at step '{step}': {source}{}", retained_suffix(.retained))]
    Halted {
        step: &'static str,
        #[source]
        source: StepError,
        /// Resources left in the cluster by keep flags.
        retained: Vec<ResourceRef>,
    },

    #[error("bootable volume name not found in state")]
    MissingArtifact,
}

fn retained_suffix(retained: &[ResourceRef]) -> String {
    if retained.is_empty() {
        return String::new();
    }
    let list: Vec<String> = retained.iter().map(ToString::to_string).collect();
    format!(" (retained: {})", list.join(", "))
}

/// Failure to establish a port-forwarding tunnel.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("unsupported forwarding protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("tunnel io error: {0}")]
    Io(#[from] io::Error),
}

impl From<TunnelError> for StepError {
    fn from(e: TunnelError) -> Self {
        StepError::Failed(e.to_string())
    }
}
