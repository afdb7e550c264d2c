//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by method, status, route category
//! - `edge_request_duration_seconds` (histogram): time spent behind the filter
//! - `edge_rejections_total` (counter): rejections by reason
//! - `edge_ledger_entries` (gauge): live rate-limit ledger entries
//! - `edge_ledger_swept_total` (counter): expired entries removed by the sweeper

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::Method;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Label for `method`. Extension methods share one label.
pub fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::HEAD => "HEAD",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::PATCH => "PATCH",
        Method::DELETE => "DELETE",
        Method::OPTIONS => "OPTIONS",
        Method::CONNECT => "CONNECT",
        Method::TRACE => "TRACE",
        _ => "other",
    }
}

pub fn record_request(method: &Method, status: u16, category: &'static str, start: Instant) {
    ::metrics::counter!(
        "edge_requests_total",
        "method" => method_label(method),
        "status" => status.to_string(),
        "category" => category
    )
    .increment(1);
    ::metrics::histogram!("edge_request_duration_seconds", "category" => category)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    ::metrics::counter!("edge_rejections_total", "reason" => reason).increment(1);
}

pub fn record_ledger_size(entries: usize) {
    ::metrics::gauge!("edge_ledger_entries").set(entries as f64);
}

pub fn record_swept(removed: usize) {
    ::metrics::counter!("edge_ledger_swept_total").increment(removed as u64);
}
