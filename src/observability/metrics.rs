//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tunnel_sessions_total` (counter): sessions by command and outcome
//! - `tunnel_active_sessions` (gauge): current session count
//! - `tunnel_fallbacks_total` (counter): NAT64 fallback attempts by outcome
//! - `tunnel_bytes_total` (counter): relayed bytes by direction
//! - `tunnel_dns_exchanges_total` (counter): DoH datagram exchanges by result
//! - `tunnel_rejected_upgrades_total` (counter): upgrades refused before accept

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_session(command: &'static str, outcome: &'static str) {
    counter!("tunnel_sessions_total", "command" => command, "outcome" => outcome).increment(1);
}

pub fn set_active_sessions(count: u64) {
    gauge!("tunnel_active_sessions").set(count as f64);
}

pub fn record_fallback(outcome: &'static str) {
    counter!("tunnel_fallbacks_total", "outcome" => outcome).increment(1);
}

pub fn record_bytes(direction: &'static str, bytes: usize) {
    counter!("tunnel_bytes_total", "direction" => direction).increment(bytes as u64);
}

pub fn record_dns_exchange(ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!("tunnel_dns_exchanges_total", "result" => result).increment(1);
}

pub fn record_rejected_upgrade(reason: &'static str) {
    counter!("tunnel_rejected_upgrades_total", "reason" => reason).increment(1);
}
