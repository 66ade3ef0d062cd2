use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DurationMs;

pub const DEFAULT_IP_WAIT_TIMEOUT_MS: DurationMs = 30 * 60_000;
pub const DEFAULT_IP_SETTLE_TIMEOUT_MS: DurationMs = 5_000;

/// Guest readiness waits. A zero wait timeout skips the corresponding step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub ip_wait_timeout_ms: DurationMs,
    pub ip_settle_timeout_ms: DurationMs,
    pub agent_wait_timeout_ms: DurationMs,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            ip_wait_timeout_ms: DEFAULT_IP_WAIT_TIMEOUT_MS,
            ip_settle_timeout_ms: DEFAULT_IP_SETTLE_TIMEOUT_MS,
            agent_wait_timeout_ms: 0,
        }
    }
}

/// Polling interval for a wait, coarser for longer windows to bound
/// the number of control-plane calls.
pub fn poll_interval(window: Duration) -> Duration {
    let secs = window.as_secs();
    let every = if secs >= 120 {
        30
    } else if secs >= 60 {
        15
    } else if secs >= 10 {
        5
    } else {
        1
    };
    Duration::from_secs(every)
}
