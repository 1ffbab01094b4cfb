//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by method, status, site
//! - `edge_request_duration_seconds` (histogram): end-to-end latency
//! - `edge_origin_fetches_total` (counter): origin fetches by outcome
//! - `edge_middleware_runs_total` (counter): middleware invocations by phase, name
//! - `edge_cache_lookups_total` (counter): edge cache hits and misses
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus
//! recorder, so tests can call these freely.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    describe_counter!("edge_requests_total", "Requests handled by the edge router");
    describe_histogram!("edge_request_duration_seconds", "End-to-end request latency");
    describe_counter!("edge_origin_fetches_total", "Origin and third-party fetches");
    describe_counter!("edge_middleware_runs_total", "Middleware invocations");
    describe_counter!("edge_cache_lookups_total", "Edge cache lookups");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, site: &str, started: Instant) {
    counter!(
        "edge_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "site" => site.to_string()
    )
    .increment(1);
    histogram!("edge_request_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_origin_fetch(outcome: &'static str) {
    counter!("edge_origin_fetches_total", "outcome" => outcome).increment(1);
}

pub fn record_middleware_run(phase: &'static str, name: &str) {
    counter!(
        "edge_middleware_runs_total",
        "phase" => phase,
        "name" => name.to_string()
    )
    .increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("edge_cache_lookups_total", "result" => result).increment(1);
}
