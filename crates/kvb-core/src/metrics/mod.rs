//! Metrics collection abstraction for build steps.
//!
//! Backends (prometheus, …) implement [`MetricsBackend`] and are handed to
//! the runner; without one, [`NoOpMetrics`] is used.
mod backend;
pub use backend::{MetricsBackend, MetricsHandle, StepOutcome};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

/// Create a no-op metrics handle.
#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
