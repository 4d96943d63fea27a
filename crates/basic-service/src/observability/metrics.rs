//! Metrics definitions for the basic service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `basic_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `transport`: 2 values (http, grpc)
//! - `outcome`: 3 values (success, forced_failure, publish_failed)

use common::transport::Transport;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Injected delays are caller-controlled, so cover up to tens of seconds
        .set_buckets_for_metric(
            Matcher::Full("basic_injected_delay_seconds".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
                30.000,
            ],
        )
        .map_err(|e| format!("Failed to set injected delay buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record a completed echo request.
///
/// Metric: `basic_requests_total`
/// Labels: `transport`, `outcome`
pub fn record_request(transport: Transport, outcome: &'static str) {
    counter!(
        "basic_requests_total",
        "transport" => transport.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an injected delay that was honored.
///
/// Metric: `basic_injected_delay_seconds`
/// Labels: `transport`
pub fn record_injected_delay(transport: Transport, delay: Duration) {
    histogram!(
        "basic_injected_delay_seconds",
        "transport" => transport.as_str()
    )
    .record(delay.as_secs_f64());
}

/// Record a failed telemetry publish.
///
/// Metric: `basic_publish_failures_total`
/// Labels: `transport`
pub fn record_publish_failure(transport: Transport) {
    counter!(
        "basic_publish_failures_total",
        "transport" => transport.as_str()
    )
    .increment(1);
}
