//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_calls_total` (counter): breaker-gated calls by breaker, outcome
//! - `guard_rejections_total` (counter): fail-fast rejections by breaker, reason
//! - `guard_breaker_state` (gauge): 0=closed, 1=half_open, 2=open
//! - `guard_retries_total` (counter): retried attempts by error kind
//! - `guard_rate_limited_total` (counter): rate-limit denials by endpoint
//! - `guard_endpoint_health_score` (gauge): last computed score by endpoint
//! - `guard_endpoint_probe_healthy` (gauge): 1=probe passed, 0=failed
//! - `guard_recoveries_total` (counter): recovery attempts by kind, outcome
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::error::{ErrorKind, RejectReason};

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_call(breaker: &str, outcome: &'static str) {
    counter!("guard_calls_total", "breaker" => breaker.to_string(), "outcome" => outcome).increment(1);
}

pub fn record_rejection(breaker: &str, reason: RejectReason) {
    let reason = match reason {
        RejectReason::Open => "open",
        RejectReason::HalfOpenLimit => "half_open_limit",
    };
    counter!("guard_rejections_total", "breaker" => breaker.to_string(), "reason" => reason).increment(1);
}

pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("guard_breaker_state", "breaker" => breaker.to_string()).set(value);
}

pub fn record_retry(kind: &ErrorKind) {
    counter!("guard_retries_total", "kind" => kind.as_str().to_string()).increment(1);
}

pub fn record_rate_limited(endpoint: &str) {
    counter!("guard_rate_limited_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_health_score(endpoint: &str, score: f64) {
    gauge!("guard_endpoint_health_score", "endpoint" => endpoint.to_string()).set(score);
}

pub fn record_probe(endpoint: &str, healthy: bool) {
    gauge!("guard_endpoint_probe_healthy", "endpoint" => endpoint.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_recovery(kind: &ErrorKind, recovered: bool) {
    let outcome = if recovered { "recovered" } else { "failed" };
    counter!("guard_recoveries_total", "kind" => kind.as_str().to_string(), "outcome" => outcome).increment(1);
}
