//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ipset_requests_total` (counter): control-plane requests by set, op, result
//! - `ipset_elements` (gauge): stored elements per set
//! - `ipset_sets` (gauge): number of live sets
//! - `ipset_config_reloads_total` (counter): reloads by result
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until a
//!   recorder is installed
//! - The packet path records nothing

use ::metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

use crate::ipset::AdtOp;

/// Install the Prometheus recorder and its HTTP listener. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// `result` is `ok`, a test verdict, or an error kind.
pub fn record_request(set: &str, op: AdtOp, result: &'static str) {
    counter!(
        "ipset_requests_total",
        "set" => set.to_string(),
        "op" => op.as_str(),
        "result" => result
    )
    .increment(1);
}

pub fn record_set_size(set: &str, len: usize) {
    gauge!("ipset_elements", "set" => set.to_string()).set(len as f64);
}

pub fn record_set_count(count: usize) {
    gauge!("ipset_sets").set(count as f64);
}

pub fn record_reload(result: &'static str) {
    counter!("ipset_config_reloads_total", "result" => result).increment(1);
}
