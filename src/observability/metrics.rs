//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): answered requests by transport, status
//!   and upstream status
//! - `relay_upstream_errors_total` (counter): upstream failures by transport
//! - `relay_upstream_latency_seconds` (histogram): time until upstream headers
//! - `relay_active_connections` (gauge): current inbound connection count
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::config::TransportMode;

/// Install the Prometheus recorder and its HTTP scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

/// Record a relayed response. The caller always sees `200`.
pub fn record_relay(transport: TransportMode, upstream_status: u16, start: Instant) {
    counter!(
        "relay_requests_total",
        "transport" => transport.as_str(),
        "status" => "200",
        "upstream_status" => upstream_status.to_string()
    )
    .increment(1);
    histogram!(
        "relay_upstream_latency_seconds",
        "transport" => transport.as_str()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record an upstream failure (answered with 500).
pub fn record_upstream_error(transport: TransportMode) {
    counter!(
        "relay_upstream_errors_total",
        "transport" => transport.as_str()
    )
    .increment(1);
    counter!(
        "relay_requests_total",
        "transport" => transport.as_str(),
        "status" => "500",
        "upstream_status" => "none"
    )
    .increment(1);
}

/// Publish the current inbound connection count.
pub fn set_active_connections(count: u64) {
    gauge!("relay_active_connections").set(count as f64);
}
