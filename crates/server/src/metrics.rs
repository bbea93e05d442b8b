//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the subfetch server:
//! - HTTP request metrics per matched route
//! - Worker pool occupancy (collected dynamically)
//! - Core acquisition, provider and activation metrics

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// Route label for requests no route matched.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Time to answer a request; webhook answers include the whole acquisition.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "subfetch_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]),
        &["route"],
    )
    .unwrap()
});

/// Answered requests by route and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subfetch_http_requests_total", "Total HTTP requests"),
        &["method", "route", "status"],
    )
    .unwrap()
});

// =============================================================================
// Worker Pool Metrics
// =============================================================================

/// Configured worker count.
pub static WORKERS_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("subfetch_workers_total", "Configured worker pool size").unwrap()
});

/// Workers not currently running a webhook.
pub static WORKERS_AVAILABLE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("subfetch_workers_available", "Idle workers in the pool").unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();

    // Workers
    registry.register(Box::new(WORKERS_TOTAL.clone())).unwrap();
    registry
        .register(Box::new(WORKERS_AVAILABLE.clone()))
        .unwrap();

    // Core metrics (acquisition, providers, activation, webhooks)
    for metric in subfetch_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Update gauges from current application state before encoding.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let pool = state.pool();
    WORKERS_TOTAL.set(pool.size() as i64);
    WORKERS_AVAILABLE.set(pool.available() as i64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/api/v1/health", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("subfetch_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        WORKERS_TOTAL.set(2);
        subfetch_core::metrics::WEBHOOK_EVENTS
            .with_label_values(&["ignored"])
            .inc();
        subfetch_core::metrics::ACQUISITIONS
            .with_label_values(&["not_found"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("subfetch_workers_total"));
        assert!(output.contains("subfetch_webhook_events_total"));
        assert!(output.contains("subfetch_acquisitions_total"));
    }
}
