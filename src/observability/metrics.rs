//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rebroadcast_attempts_total` (counter): attempts by outcome
//! - `rebroadcast_attempt_duration_seconds` (histogram): attempt latency
//! - `rebroadcast_skipped_ticks_total` (counter): ticks skipped due to overlap
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

/// Record a finished attempt. `outcome` is `confirmed` or an error kind.
pub fn record_attempt(outcome: &'static str, elapsed: Duration) {
    ::metrics::counter!("rebroadcast_attempts_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("rebroadcast_attempt_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

pub fn record_skipped_tick() {
    ::metrics::counter!("rebroadcast_skipped_ticks_total").increment(1);
}
