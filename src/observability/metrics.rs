//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define adapter metrics (outcomes, shapes, rewrites, latency)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `adapter_requests_total` (counter): adapt calls by outcome
//! - `adapter_duration_seconds` (histogram): adapt latency
//! - `adapter_shapes_total` (counter): matched paths by shape
//! - `adapter_rewrites_total` (counter): requests changed by a rewrite
//! - `adapter_invocation_errors_total` (counter): relayed failures by status
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels are low-cardinality (outcome, shape, status code)

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::routing::Shape;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_adapt(outcome: &'static str, elapsed: Duration) {
    metrics::counter!("adapter_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("adapter_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_shape(shape: Shape) {
    metrics::counter!("adapter_shapes_total", "shape" => shape.as_str()).increment(1);
}

pub fn record_rewrite() {
    metrics::counter!("adapter_rewrites_total").increment(1);
}

/// `None` (a non-numeric status) is labelled `NaN`.
pub fn record_invocation_error(status_code: Option<u16>) {
    let status = status_code.map_or_else(|| "NaN".to_string(), |s| s.to_string());
    metrics::counter!("adapter_invocation_errors_total", "status" => status).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_adapt("ok", Duration::from_millis(3));
        record_shape(Shape::Fragment);
        record_rewrite();
        record_invocation_error(None);
        record_invocation_error(Some(500));
    }
}
