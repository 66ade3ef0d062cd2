use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::Duration;

use kvb_core::cluster::VirtClient;
use kvb_core::error::StepError;
use kvb_model::config::poll_interval;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Polls an instance for its first interface address and accepts it once
/// it has stayed unchanged for longer than the settle window.
///
/// Every change, including the first observation, restarts the window.
/// A zero window accepts the first non-empty address at once.
pub struct AddressWorker {
    pub client: Arc<dyn VirtClient>,
    pub namespace: String,
    pub name: String,
    pub settle: Duration,
}

impl AddressWorker {
    /// Spawns the poller.
    ///
    /// Returns a receiver of the last non-empty address observed so far and
    /// the receiver of the final result.
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (
        watch::Receiver<Option<String>>,
        oneshot::Receiver<Result<String, StepError>>,
    ) {
        let (seen_tx, seen_rx) = watch::channel(None);
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            let res = tokio::select! {
                res = self.poll(&seen_tx) => res,
                _ = cancel.cancelled() => Err(StepError::cancelled("IP")),
            };
            let _ = done_tx.send(res);
        });

        (seen_rx, done_rx)
    }

    async fn poll(&self, seen: &watch::Sender<Option<String>>) -> Result<String, StepError> {
        let mut ticker = tokio::time::interval(poll_interval(self.settle));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last: Option<String> = None;
        let mut stable_since = Instant::now();

        loop {
            ticker.tick().await;

            let vmi = self.client.get_vmi(&self.namespace, &self.name).await?;
            let addr = vmi.status.first_address().ok_or_else(|| {
                StepError::Failed(format!(
                    "error getting VMI instance {}/{}: no interfaces reported",
                    self.namespace, self.name
                ))
            })?;
            let now = Instant::now();
            trace!(addr, "polled instance address");

            if last.as_deref() != Some(addr) {
                debug!(from = ?last, to = addr, "instance address changed");
                last = Some(addr.to_string());
                stable_since = now;
                if !addr.is_empty() {
                    seen.send_replace(Some(addr.to_string()));
                    if self.settle.is_zero() {
                        return Ok(addr.to_string());
                    }
                }
                continue;
            }

            if !addr.is_empty() && now.duration_since(stable_since) > self.settle {
                return Ok(addr.to_string());
            }
        }
    }
}

/// Wraps an IPv6 literal in brackets so it can be joined with a port.
pub fn bracket_ipv6(addr: &str) -> String {
    match addr.parse::<Ipv6Addr>() {
        Ok(_) => format!("[{addr}]"),
        Err(_) => addr.to_string(),
    }
}
