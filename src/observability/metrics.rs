//! Metrics collection and exposition.
//!
//! # Metrics
//! - `render_requests_total` (counter): renders by mode and outcome
//! - `render_duration_seconds` (histogram): time to outcome by mode
//! - `service_calls_total` (counter): service dispatches by service, method, outcome
//! - `service_call_duration_seconds` (histogram): dispatch latency by service
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed (tests, library use)
//! - Prometheus exposition is opt-in via config

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

use crate::routing::RenderMode;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_render(mode: RenderMode, outcome: &'static str, start: Instant) {
    counter!(
        "render_requests_total",
        "mode" => mode.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("render_duration_seconds", "mode" => mode.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_service_call(service: &str, method: &str, outcome: &'static str, start: Instant) {
    counter!(
        "service_calls_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("service_call_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}
