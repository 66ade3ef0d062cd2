use std::sync::Arc;

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

use kvb_core::metrics::{MetricsBackend, StepOutcome};

const NAMESPACE: &str = "kvb";

/// Step metrics in a Prometheus registry.
///
/// ## Label cardinality
/// - `step`: one value per step of the fixed build sequence
/// - `outcome`: "success", "failure", "canceled", "timeout"
/// - `error_kind`: see `StepError::kind`
#[derive(Clone)]
pub struct PrometheusMetrics {
    steps_started: CounterVec,
    steps_completed: CounterVec,
    step_duration: HistogramVec,
    cleanup_errors: CounterVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let steps_started = CounterVec::new(
            Opts::new("steps_started_total", "Build steps started").namespace(NAMESPACE),
            &["step"],
        )?;
        registry.register(Box::new(steps_started.clone()))?;

        let steps_completed = CounterVec::new(
            Opts::new("steps_completed_total", "Build steps finished, by outcome")
                .namespace(NAMESPACE),
            &["step", "outcome"],
        )?;
        registry.register(Box::new(steps_completed.clone()))?;

        // Steps range from sub-second API calls to hour-long installs.
        let step_duration = HistogramVec::new(
            HistogramOpts::new("step_duration_seconds", "Forward action duration of a build step")
                .namespace(NAMESPACE)
                .buckets(vec![
                    0.1, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0,
                ]),
            &["step"],
        )?;
        registry.register(Box::new(step_duration.clone()))?;

        let cleanup_errors = CounterVec::new(
            Opts::new("cleanup_errors_total", "Failed step cleanups").namespace(NAMESPACE),
            &["step", "error_kind"],
        )?;
        registry.register(Box::new(cleanup_errors.clone()))?;

        Ok(Self {
            steps_started,
            steps_completed,
            step_duration,
            cleanup_errors,
            registry,
        })
    }

    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// All metrics in the text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_step_started(&self, step: &str) {
        self.steps_started.with_label_values(&[step]).inc();
    }

    fn record_step_completed(&self, step: &str, outcome: StepOutcome, duration_ms: u64) {
        self.steps_completed
            .with_label_values(&[step, outcome.as_label()])
            .inc();
        self.step_duration
            .with_label_values(&[step])
            .observe(duration_ms as f64 / 1000.0);
    }

    fn record_cleanup_error(&self, step: &str, error_kind: &str) {
        self.cleanup_errors
            .with_label_values(&[step, error_kind])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family<'a>(families: &'a [MetricFamily], name: &str) -> &'a MetricFamily {
        families
            .iter()
            .find(|f| f.name() == name)
            .unwrap_or_else(|| panic!("{name} not found"))
    }

    #[test]
    fn started_is_labelled_by_step() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_step_started("validate-iso-volume");
        metrics.record_step_started("create-virtual-machine");
        metrics.record_step_started("create-virtual-machine");

        let families = metrics.gather();
        assert_eq!(family(&families, "kvb_steps_started_total").get_metric().len(), 2);
    }

    #[test]
    fn completed_records_outcome_and_duration() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_step_completed("wait-for-ip", StepOutcome::Success, 42_000);
        metrics.record_step_completed("wait-for-ip", StepOutcome::Timeout, 1_800_000);

        let families = metrics.gather();
        assert_eq!(family(&families, "kvb_steps_completed_total").get_metric().len(), 2);

        assert_eq!(family(&families, "kvb_step_duration_seconds").get_metric().len(), 1);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains(r#"kvb_step_duration_seconds_count{step="wait-for-ip"} 2"#));
        assert!(text.contains(r#"kvb_step_duration_seconds_sum{step="wait-for-ip"} 1842"#));
    }

    #[test]
    fn cleanup_errors_are_counted() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_cleanup_error("create-virtual-machine", "cluster");
        metrics.record_cleanup_error("create-virtual-machine", "cluster");

        let text = metrics.encode_text().unwrap();
        assert!(text.contains(
            r#"kvb_cleanup_errors_total{error_kind="cluster",step="create-virtual-machine"} 2"#
        ));
    }

    #[test]
    fn registering_twice_in_one_registry_fails() {
        let registry = Arc::new(Registry::new());
        PrometheusMetrics::new_with_registry(registry.clone()).unwrap();
        assert!(PrometheusMetrics::new_with_registry(registry).is_err());
    }
}
