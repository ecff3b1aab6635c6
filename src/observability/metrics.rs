//! Metrics collection and exposition.
//!
//! # Metrics
//! - `logging_level_transitions_total` (counter): by `from`, `to`
//! - `logging_reconcile_failures_total` (counter): by `reason`
//! - `logging_records_dropped_total` (counter): by `sink`
//! - `logging_minimum_level` (gauge): active level as its ordinal
//!
//! Without an installed recorder these calls are no-ops.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::level::Severity;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_level_transition(from: Severity, to: Severity) {
    counter!(
        "logging_level_transitions_total",
        "from" => from.name(),
        "to" => to.name()
    )
    .increment(1);
    record_level(to);
}

pub fn record_level(level: Severity) {
    gauge!("logging_minimum_level").set(level as u8 as f64);
}

pub fn record_reconcile_failure(reason: &'static str) {
    counter!("logging_reconcile_failures_total", "reason" => reason).increment(1);
}

pub fn record_dropped(sink: &'static str) {
    counter!("logging_records_dropped_total", "sink" => sink).increment(1);
}
