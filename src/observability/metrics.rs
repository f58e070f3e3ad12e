//! Metrics collection and exposition.
//!
//! # Metrics
//! - `restcore_requests_total` (counter): dispatched requests by method, outcome
//! - `restcore_request_duration_seconds` (histogram): dispatch latency by method
//! - `restcore_auth_rejections_total` (counter): requests refused by the auth gate
//! - `restcore_cog_events_total` (counter): cog loads, unloads and failed loads
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter serves its own scrape endpoint

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one dispatched request.
pub fn record_request(method: &'static str, outcome: &'static str, start_time: Instant) {
    metrics::counter!("restcore_requests_total", "method" => method, "outcome" => outcome).increment(1);
    metrics::histogram!("restcore_request_duration_seconds", "method" => method)
        .record(start_time.elapsed().as_secs_f64());
}

pub fn record_auth_rejection() {
    metrics::counter!("restcore_auth_rejections_total").increment(1);
}

/// `event` is one of `loaded`, `unloaded`, `load_failed`.
pub fn record_cog_event(cog: &str, event: &'static str) {
    metrics::counter!("restcore_cog_events_total", "cog" => cog.to_string(), "event" => event).increment(1);
}
