//! Step lifecycle logging.
//!
//! Maps runner transitions to tracing events with a severity per outcome.
//! Wraps another backend so logging and metrics can be used together.
use kvb_core::metrics::{MetricsBackend, MetricsHandle, StepOutcome, noop_metrics};
use tracing::{error, info, trace, warn};

/// [`MetricsBackend`] that logs every step transition before forwarding
/// it to an inner backend.
pub struct StepLogger {
    inner: MetricsHandle,
}

impl Default for StepLogger {
    fn default() -> Self {
        Self::new(noop_metrics())
    }
}

impl StepLogger {
    pub fn new(inner: MetricsHandle) -> Self {
        Self { inner }
    }
}

impl MetricsBackend for StepLogger {
    fn record_step_started(&self, step: &str) {
        trace!(step, "step starting");
        self.inner.record_step_started(step);
    }

    fn record_step_completed(&self, step: &str, outcome: StepOutcome, duration_ms: u64) {
        let outcome_label = outcome.as_label();
        match outcome {
            StepOutcome::Success => info!(step, duration_ms, "step finished"),
            StepOutcome::Canceled => {
                warn!(step, duration_ms, outcome = outcome_label, "step cancelled")
            }
            StepOutcome::Timeout | StepOutcome::Failure => {
                error!(step, duration_ms, outcome = outcome_label, "step failed")
            }
        }
        self.inner.record_step_completed(step, outcome, duration_ms);
    }

    fn record_cleanup_error(&self, step: &str, error_kind: &str) {
        warn!(step, error_kind, "cleanup left resources behind");
        self.inner.record_cleanup_error(step, error_kind);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl MetricsBackend for Recording {
        fn record_step_started(&self, step: &str) {
            self.0.lock().unwrap().push(format!("started:{step}"));
        }

        fn record_step_completed(&self, step: &str, outcome: StepOutcome, _: u64) {
            self.0
                .lock()
                .unwrap()
                .push(format!("completed:{step}:{}", outcome.as_label()));
        }

        fn record_cleanup_error(&self, step: &str, kind: &str) {
            self.0.lock().unwrap().push(format!("cleanup:{step}:{kind}"));
        }
    }

    #[test]
    fn forwards_every_event() {
        let inner = Arc::new(Recording::default());
        let logger = StepLogger::new(inner.clone());

        logger.record_step_started("create-virtual-machine");
        logger.record_step_completed("create-virtual-machine", StepOutcome::Timeout, 3_600_000);
        logger.record_cleanup_error("copy-media-files", "cluster");

        assert_eq!(
            *inner.0.lock().unwrap(),
            [
                "started:create-virtual-machine",
                "completed:create-virtual-machine:timeout",
                "cleanup:copy-media-files:cluster",
            ]
        );
    }

    #[test]
    fn default_logs_without_inner_backend() {
        let logger = StepLogger::default();
        logger.record_step_completed("stop-virtual-machine", StepOutcome::Success, 12);
    }
}
