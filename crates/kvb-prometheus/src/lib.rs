//! Prometheus backend for build step metrics.
//!
//! [`PrometheusMetrics`] implements [`kvb_core::metrics::MetricsBackend`]
//! and is handed to the builder like any other backend:
//!
//! ```rust,ignore
//! let metrics = PrometheusMetrics::new()?;
//! let deps = BuilderDeps::new(client, bundles).with_metrics(Arc::new(metrics.clone()));
//! // after the build, or from a scrape handler:
//! let body = metrics.encode_text()?;
//! ```
//!
//! ## Metrics
//! - `kvb_steps_started_total{step}` - Counter
//! - `kvb_steps_completed_total{step, outcome}` - Counter
//! - `kvb_step_duration_seconds{step}` - Histogram
//! - `kvb_cleanup_errors_total{step, error_kind}` - Counter
//!
//! No HTTP endpoint is provided; long-running callers expose
//! [`PrometheusMetrics::gather`] through their own server, one-shot builds
//! can write [`PrometheusMetrics::encode_text`] to a textfile collector.
mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
