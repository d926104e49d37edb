//! Metrics collection and exposition.
//!
//! # Metrics
//! - `client_requests_total` (counter): logical requests by method, outcome
//! - `client_request_duration_seconds` (histogram): latency including retries
//! - `client_retries_total` (counter): retry attempts scheduled
//! - `client_breaker_transitions_total` (counter): state changes by breaker, target state
//! - `client_breaker_rejections_total` (counter): calls short-circuited by an open breaker
//! - `client_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished logical request (all attempts).
pub fn record_request(method: &str, outcome: &str, start: Instant) {
    counter!(
        "client_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("client_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry() {
    counter!("client_retries_total").increment(1);
}

pub fn record_breaker_transition(breaker: &str, to: CircuitState) {
    counter!(
        "client_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    record_breaker_state(breaker, to);
}

pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    gauge!("client_breaker_state", "breaker" => breaker.to_string()).set(state as u8 as f64);
}

pub fn record_breaker_rejection(breaker: &str) {
    counter!("client_breaker_rejections_total", "breaker" => breaker.to_string()).increment(1);
}
