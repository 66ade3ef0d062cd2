//! Sequential step runner with reverse-order unwinding.
//!
//! Steps run strictly in list order. When one halts, forward execution
//! stops. Either way, every step that continued is then cleaned up, newest
//! first. The halting step itself is not cleaned up: a step undoes its
//! own partial work before returning [`StepAction::Halt`].
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Halted, StepError};
use crate::metrics::{MetricsHandle, StepOutcome, noop_metrics};
use crate::state::StateBag;
use crate::step::{Step, StepAction};

/// Outcome of [`Runner::run`].
#[derive(Debug)]
pub struct RunReport {
    /// Final state, including everything written by cleanups.
    pub state: StateBag,
    /// `None` if every step continued.
    pub halt: Option<Halted>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.halt.is_none()
    }
}

pub struct Runner {
    steps: Vec<Box<dyn Step>>,
    metrics: MetricsHandle,
}

impl Runner {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            steps,
            metrics: noop_metrics(),
        }
    }

    /// Replace the metrics backend and return updated runner.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Runs all steps against `state`.
    ///
    /// A token cancelled between two steps halts the build before the next
    /// one starts with [`StepError::NotStarted`], so a cancelled build never
    /// reports success.
    #[instrument(level = "debug", skip_all, fields(steps = self.steps.len()))]
    pub async fn run(&self, cancel: &CancellationToken, mut state: StateBag) -> RunReport {
        let mut executed: Vec<&dyn Step> = Vec::with_capacity(self.steps.len());
        let mut halt = None;

        for step in &self.steps {
            let name = step.name();

            let action = if cancel.is_cancelled() {
                StepAction::Halt(StepError::NotStarted)
            } else {
                self.metrics.record_step_started(name);
                debug!(step = name, "step started");
                let started = Instant::now();

                let action = step.run(cancel, &mut state).await;

                let elapsed = started.elapsed().as_millis() as u64;
                let outcome = match &action {
                    StepAction::Continue => StepOutcome::Success,
                    StepAction::Halt(err) => StepOutcome::from(err),
                };
                self.metrics.record_step_completed(name, outcome, elapsed);
                action
            };

            match action {
                StepAction::Continue => {
                    debug!(step = name, "step continued");
                    executed.push(step.as_ref());
                }
                StepAction::Halt(err) => {
                    error!(step = name, kind = err.kind(), error = %err, "step halted");
                    halt = Some(Halted {
                        step: name,
                        source: err,
                    });
                    break;
                }
            }
        }

        if halt.is_none() {
            info!("all steps completed");
        }
        self.unwind(&executed, &mut state).await;

        RunReport { state, halt }
    }

    async fn unwind(&self, executed: &[&dyn Step], state: &mut StateBag) {
        for step in executed.iter().rev() {
            let name = step.name();
            debug!(step = name, "cleaning up");
            if let Err(err) = step.cleanup(state).await {
                warn!(step = name, error = %err, "cleanup failed");
                self.metrics.record_cleanup_error(name, err.kind());
            }
        }
    }
}
