//! Local TCP listener relayed to a workload port through the control plane.
//!
//! Each accepted connection gets its own stream from
//! [`VirtClient::open_port_stream`] and is copied in both directions until
//! either side closes or the forwarder's token is cancelled.
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use kvb_core::cluster::{PortTarget, VirtClient};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::TunnelError;

/// Transport of a forwarded port.
///
/// Only [`Protocol::Tcp`] is relayed. [`ClusterPortForwarder`] rejects
/// `Udp` with [`TunnelError::UnsupportedProtocol`] before binding anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
        }
    }
}

/// Port pair of a tunnel. `local == 0` binds an ephemeral port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardedPort {
    pub local: u16,
    pub remote: u16,
    pub protocol: Protocol,
}

#[async_trait]
pub trait PortForwarder: Send + Sync {
    /// Binds the local end and starts relaying in the background.
    /// Returns the bound local address.
    async fn start_forwarding(
        &self,
        address: IpAddr,
        port: ForwardedPort,
    ) -> Result<SocketAddr, TunnelError>;
}

/// Creates a forwarder for one workload; the relay stops with `cancel`.
pub trait ForwarderFactory: Send + Sync {
    fn forwarder(&self, target: PortTarget, cancel: CancellationToken) -> Box<dyn PortForwarder>;
}

/// Factory of [`ClusterPortForwarder`]s sharing one client.
pub struct ClusterForwarderFactory {
    client: Arc<dyn VirtClient>,
}

impl ClusterForwarderFactory {
    pub fn new(client: Arc<dyn VirtClient>) -> Self {
        Self { client }
    }
}

impl ForwarderFactory for ClusterForwarderFactory {
    fn forwarder(&self, target: PortTarget, cancel: CancellationToken) -> Box<dyn PortForwarder> {
        Box::new(ClusterPortForwarder {
            client: self.client.clone(),
            target,
            cancel,
        })
    }
}

pub struct ClusterPortForwarder {
    client: Arc<dyn VirtClient>,
    target: PortTarget,
    cancel: CancellationToken,
}

#[async_trait]
impl PortForwarder for ClusterPortForwarder {
    async fn start_forwarding(
        &self,
        address: IpAddr,
        port: ForwardedPort,
    ) -> Result<SocketAddr, TunnelError> {
        if port.protocol != Protocol::Tcp {
            return Err(TunnelError::UnsupportedProtocol(port.protocol.to_string()));
        }

        let addr = SocketAddr::new(address, port.local);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TunnelError::Bind { addr, source })?;
        let bound = listener.local_addr()?;
        debug!(%bound, target = %self.target, remote = port.remote, "forwarding started");

        tokio::spawn(accept_loop(
            listener,
            self.client.clone(),
            self.target.clone(),
            port.remote,
            self.cancel.clone(),
        ));
        Ok(bound)
    }
}

async fn accept_loop(
    listener: TcpListener,
    client: Arc<dyn VirtClient>,
    target: PortTarget,
    remote: u16,
    cancel: CancellationToken,
) {
    loop {
        let (socket, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            res = listener.accept() => match res {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "tunnel accept failed");
                    continue;
                }
            },
        };
        trace!(%peer, "tunnel connection accepted");
        tokio::spawn(relay(
            socket,
            client.clone(),
            target.clone(),
            remote,
            cancel.clone(),
        ));
    }
    debug!(target = %target, "forwarding stopped");
}

async fn relay(
    mut socket: TcpStream,
    client: Arc<dyn VirtClient>,
    target: PortTarget,
    remote: u16,
    cancel: CancellationToken,
) {
    let mut upstream = match client.open_port_stream(&target, remote).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, target = %target, "cannot open port stream");
            return;
        }
    };
    tokio::select! {
        _ = cancel.cancelled() => {}
        res = tokio::io::copy_bidirectional(&mut socket, &mut upstream) => match res {
            Ok((up, down)) => trace!(up, down, "tunnel connection closed"),
            Err(e) => debug!(error = %e, "tunnel connection ended"),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use kvb_core::testing::FakeCluster;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    fn forwarder(cluster: &FakeCluster, cancel: &CancellationToken) -> Box<dyn PortForwarder> {
        ClusterForwarderFactory::new(Arc::new(cluster.clone()))
            .forwarder(PortTarget::vmi("images", "vm"), cancel.clone())
    }

    #[tokio::test]
    async fn relays_bytes_through_port_stream() {
        let cluster = FakeCluster::new();
        let cancel = CancellationToken::new();

        let bound = forwarder(&cluster, &cancel)
            .start_forwarding(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                ForwardedPort {
                    local: 0,
                    remote: 22,
                    protocol: Protocol::Tcp,
                },
            )
            .await
            .unwrap();
        assert_ne!(bound.port(), 0);

        let mut conn = TcpStream::connect(bound).await.unwrap();
        conn.write_all(b"SSH-2.0-probe\r\n").await.unwrap();
        let mut buf = [0u8; 15];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"SSH-2.0-probe\r\n");

        assert!(cluster.called("open_port_stream"));
        assert!(cluster.calls().contains(&"open_port_stream images/vm:22".to_string()));
        cancel.cancel();
    }

    #[tokio::test]
    async fn udp_is_rejected() {
        let cluster = FakeCluster::new();
        let err = forwarder(&cluster, &CancellationToken::new())
            .start_forwarding(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                ForwardedPort {
                    local: 0,
                    remote: 53,
                    protocol: Protocol::Udp,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TunnelError::UnsupportedProtocol(_)));
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let taken = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let cluster = FakeCluster::new();
        let err = forwarder(&cluster, &CancellationToken::new())
            .start_forwarding(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                ForwardedPort {
                    local: port,
                    remote: 22,
                    protocol: Protocol::Tcp,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TunnelError::Bind { .. }));
    }
}
