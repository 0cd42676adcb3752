//! Metrics collection and exposition.
//!
//! # Metrics
//! - `deadline_scope_derived_total` (counter): derivations by governing origin
//! - `deadline_user_timeout_total` (counter): `timeout` parameter outcomes
//! - `deadline_requests_expired_total` (counter): requests cut off by their scope
//! - `deadline_request_duration_seconds` (histogram): latency by status

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::deadline::{DeadlineOrigin, UserTimeout};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_scope_derived(origin: DeadlineOrigin, user_timeout: &UserTimeout) {
    counter!("deadline_scope_derived_total", "origin" => origin.as_str()).increment(1);
    counter!("deadline_user_timeout_total", "outcome" => user_timeout.outcome()).increment(1);
}

pub fn record_deadline_exceeded(origin: DeadlineOrigin) {
    counter!("deadline_requests_expired_total", "origin" => origin.as_str()).increment(1);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    histogram!(
        "deadline_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}
