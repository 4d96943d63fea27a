//! Metrics definitions for the requester service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `requester_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `transport`: 2 values (http, grpc)
//! - `outcome`: 2 values (relayed, unavailable)

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
        // Forward durations include delays injected downstream
        .set_buckets_for_metric(
            Matcher::Full("requester_forward_duration_seconds".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
                30.000,
            ],
        )
        .map_err(|e| format!("Failed to set forward duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record one forwarded request.
///
/// Metrics: `requester_forwards_total`, `requester_forward_duration_seconds`
/// Labels: `transport`, `outcome` (counter only)
pub fn record_forward(transport: Transport, outcome: &'static str, duration: Duration) {
    counter!(
        "requester_forwards_total",
        "transport" => transport.as_str(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        "requester_forward_duration_seconds",
        "transport" => transport.as_str()
    )
    .record(duration.as_secs_f64());
}
