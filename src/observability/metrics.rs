//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_active_connections` (gauge): open client connections
//! - `gateway_upgrade_tunnels` (gauge): live upgraded tunnels
//! - `gateway_redirects_total` (counter): plaintext redirects issued
//! - `gateway_tls_handshake_failures_total` (counter)
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn set_active_connections(count: u64) {
    gauge!("gateway_active_connections").set(count as f64);
}

pub fn tunnel_opened() {
    gauge!("gateway_upgrade_tunnels").increment(1.0);
}

pub fn tunnel_closed() {
    gauge!("gateway_upgrade_tunnels").decrement(1.0);
}

pub fn record_redirect() {
    counter!("gateway_redirects_total").increment(1);
}

pub fn record_handshake_failure() {
    counter!("gateway_tls_handshake_failures_total").increment(1);
}
