//! Metrics collection and exposition.
//!
//! # Metrics
//! - `account_requests_total` (counter): calls by transport, method, outcome code
//! - `account_request_duration_seconds` (histogram): latency by transport, method
//! - `account_rate_limited_total` (counter): limiter rejections by transport
//! - `account_circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `account_circuit_breaker_transitions_total` (counter): transitions by target state
//!
//! # Design Decisions
//! - Outcome label is the error code (`ok` on success), never a message
//! - Breaker metrics are labelled by operation name

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::domain::ErrorCode;
use crate::resilience::BreakerState;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

/// Record one completed service call.
pub fn record_request(
    transport: &'static str,
    method: &'static str,
    outcome: Option<ErrorCode>,
    elapsed: Duration,
) {
    let code = outcome.map_or("ok", ErrorCode::as_str);
    metrics::counter!(
        "account_requests_total",
        "transport" => transport,
        "method" => method,
        "code" => code
    )
    .increment(1);
    metrics::histogram!(
        "account_request_duration_seconds",
        "transport" => transport,
        "method" => method
    )
    .record(elapsed.as_secs_f64());
}

/// Record a request rejected by the rate limiter.
pub fn record_rate_limited(transport: &'static str) {
    metrics::counter!("account_rate_limited_total", "transport" => transport).increment(1);
}

/// Record a breaker entering `to`.
pub fn record_breaker_transition(operation: &'static str, to: BreakerState) {
    let value = match to {
        BreakerState::Closed => 0.0,
        BreakerState::Open => 1.0,
        BreakerState::HalfOpen => 2.0,
    };
    metrics::gauge!("account_circuit_breaker_state", "operation" => operation).set(value);
    metrics::counter!(
        "account_circuit_breaker_transitions_total",
        "operation" => operation,
        "to" => to.as_str()
    )
    .increment(1);
}
