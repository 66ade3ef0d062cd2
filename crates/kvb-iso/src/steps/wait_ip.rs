use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kvb_core::cluster::VirtClient;
use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_core::step::{Step, StepAction};
use kvb_model::BuildConfig;
use kvb_model::constants::{STATE_ERROR, STATE_IP};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::steps::POLL_INTERVAL;
use crate::wait::{AddressWorker, bracket_ipv6};

const WHAT: &str = "IP";

/// Discovers the guest address and waits for it to settle.
///
/// On timeout the last address seen, settled or not, is accepted with a
/// warning. The build only halts when no address was ever reported.
pub struct StepWaitForIp {
    config: Arc<BuildConfig>,
    client: Arc<dyn VirtClient>,
}

impl StepWaitForIp {
    pub fn new(config: Arc<BuildConfig>, client: Arc<dyn VirtClient>) -> Self {
        Self { config, client }
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<String, StepError> {
        let window = Duration::from_millis(self.config.wait.ip_wait_timeout_ms);
        let settle = Duration::from_millis(self.config.wait.ip_settle_timeout_ms);
        info!(?window, ?settle, "waiting for IP address");

        let worker_token = cancel.child_token();
        let _stop_worker = worker_token.clone().drop_guard();
        let (seen, mut done) = AddressWorker {
            client: self.client.clone(),
            namespace: self.config.namespace.clone(),
            name: self.config.vm_name.clone(),
            settle,
        }
        .spawn(worker_token);

        let deadline = Instant::now() + window;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StepError::cancelled(WHAT)),
                res = &mut done => {
                    return match res {
                        Ok(res) => res,
                        Err(_) => Err(StepError::Failed("address watcher stopped".into())),
                    };
                }
                _ = tokio::time::sleep_until(deadline) => {
                    let last = seen.borrow().clone();
                    return match last {
                        Some(addr) => {
                            warn!(addr, "IP address did not settle in time, using last address seen");
                            Ok(addr)
                        }
                        None => Err(StepError::timeout(WHAT, window)),
                    };
                }
                _ = heartbeat.tick() => debug!("still waiting for IP address"),
            }
        }
    }
}

#[async_trait]
impl Step for StepWaitForIp {
    fn name(&self) -> &'static str {
        "wait-for-ip"
    }

    async fn run(&self, cancel: &CancellationToken, state: &mut StateBag) -> StepAction {
        if self.config.wait.ip_wait_timeout_ms == 0 {
            return StepAction::Continue;
        }
        match self.execute(cancel).await {
            Ok(addr) => {
                let addr = bracket_ipv6(&addr);
                info!(addr, "IP address discovered");
                state.put(STATE_IP, addr);
                StepAction::Continue
            }
            Err(e) => {
                state.put(STATE_ERROR, e.to_string());
                StepAction::Halt(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use kvb_core::testing::FakeCluster;

    use super::*;
    use crate::steps::fixtures;

    fn step(cluster: &FakeCluster, wait_ms: u64, settle_ms: u64) -> StepWaitForIp {
        let mut config = fixtures::config();
        config.wait.ip_wait_timeout_ms = wait_ms;
        config.wait.ip_settle_timeout_ms = settle_ms;
        StepWaitForIp::new(Arc::new(config), Arc::new(cluster.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn accepts_settled_address() {
        let cluster = FakeCluster::new();
        cluster.script_addresses(&["", "", "1.2.3.4", "1.2.3.4", "8.8.8.8"]);

        let mut state = StateBag::new();
        let action = step(&cluster, 60_000, 1_000)
            .run(&CancellationToken::new(), &mut state)
            .await;

        assert!(action.is_continue());
        assert_eq!(state.get_str(STATE_IP), Some("8.8.8.8"));
    }

    #[tokio::test(start_paused = true)]
    async fn brackets_ipv6() {
        let cluster = FakeCluster::new();
        cluster.script_addresses(&["fd10:0:2::2"]);

        let mut state = StateBag::new();
        let action = step(&cluster, 60_000, 0)
            .run(&CancellationToken::new(), &mut state)
            .await;

        assert!(action.is_continue());
        assert_eq!(state.get_str(STATE_IP), Some("[fd10:0:2::2]"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back_to_unsettled_address() {
        let cluster = FakeCluster::new();
        // Changes on every poll, so it never settles.
        let flapping: Vec<String> = (0..200).map(|i| format!("10.0.{}.{}", i / 250, i % 250)).collect();
        let flapping: Vec<&str> = flapping.iter().map(String::as_str).collect();
        cluster.script_addresses(&flapping);

        let mut state = StateBag::new();
        let action = step(&cluster, 20_000, 5_000)
            .run(&CancellationToken::new(), &mut state)
            .await;

        assert!(action.is_continue());
        assert!(state.get_str(STATE_IP).is_some_and(|ip| ip.starts_with("10.0.")));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_any_address_halts() {
        let cluster = FakeCluster::new();
        cluster.script_addresses(&[""]);

        let mut state = StateBag::new();
        let action = step(&cluster, 20_000, 5_000)
            .run(&CancellationToken::new(), &mut state)
            .await;

        assert!(matches!(action, StepAction::Halt(StepError::Timeout { .. })));
        assert_eq!(state.get_str(STATE_ERROR), Some("IP wait timeout exceeded (20s)"));
        assert!(!state.contains(STATE_IP));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_interface_list_halts() {
        let cluster = FakeCluster::new();
        cluster.script_vmi([Default::default()]);

        let mut state = StateBag::new();
        let action = step(&cluster, 20_000, 5_000)
            .run(&CancellationToken::new(), &mut state)
            .await;

        assert!(matches!(action, StepAction::Halt(StepError::Failed(_))));
        assert!(state.contains(STATE_ERROR));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_halts_even_with_address_seen() {
        let cluster = FakeCluster::new();
        cluster.script_addresses(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(8)).await;
            trigger.cancel();
        });

        let mut state = StateBag::new();
        let action = step(&cluster, 600_000, 60_000).run(&cancel, &mut state).await;

        assert!(matches!(action, StepAction::Halt(StepError::Cancelled { .. })));
        assert!(!state.contains(STATE_IP));
    }

    #[tokio::test]
    async fn zero_wait_skips() {
        let cluster = FakeCluster::new();
        let action = step(&cluster, 0, 5_000)
            .run(&CancellationToken::new(), &mut StateBag::new())
            .await;
        assert!(action.is_continue());
        assert!(cluster.calls().is_empty());
    }
}
