//! Prometheus metrics for core components.
//!
//! - Acquisition (outcomes, duration, candidates)
//! - Provider traffic (searches, downloads, verification)
//! - Activation (live session vs default stream)
//! - Webhook events

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Acquisition
// =============================================================================

/// Pipeline invocations by outcome.
pub static ACQUISITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "subfetch_acquisitions_total",
            "Total subtitle acquisition runs",
        ),
        &["result"], // "downloaded", "kept_existing", "not_found", "error"
    )
    .unwrap()
});

/// Pipeline duration in seconds.
pub static ACQUISITION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "subfetch_acquisition_duration_seconds",
            "Duration of one acquisition run",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["result"],
    )
    .unwrap()
});

/// Ranked candidates per language attempt.
pub static CANDIDATES_FOUND: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "subfetch_candidates_found",
            "Number of ranked candidates per language",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        &["language"],
    )
    .unwrap()
});

/// Existing subtitles replaced.
pub static UPGRADES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subfetch_upgrades_total", "Existing subtitles replaced"),
        &["reason"], // "perfect_match", "popular"
    )
    .unwrap()
});

// =============================================================================
// Providers
// =============================================================================

/// Provider searches that failed and were skipped.
pub static PROVIDER_SEARCH_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "subfetch_provider_search_failures_total",
            "Provider searches that failed",
        ),
        &["provider"],
    )
    .unwrap()
});

/// Download+verify units by provider and result.
pub static DOWNLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subfetch_downloads_total", "Subtitle download attempts"),
        &["provider", "result"], // "success", "failed"
    )
    .unwrap()
});

/// Downloaded files rejected by language verification.
pub static VERIFICATION_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "subfetch_verification_failures_total",
        "Downloaded subtitles rejected for language mismatch",
    )
    .unwrap()
});

/// Retries by operation.
pub static RETRY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subfetch_retry_attempts_total", "Retries by operation"),
        &["operation"], // "download", "session_activation"
    )
    .unwrap()
});

// =============================================================================
// Activation
// =============================================================================

/// Activation results.
pub static ACTIVATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subfetch_activations_total", "Subtitle activation results"),
        &["result"], // "active_session", "default_stream", "failed"
    )
    .unwrap()
});

// =============================================================================
// Webhooks
// =============================================================================

/// Webhook events by event name and handling status.
pub static WEBHOOK_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subfetch_webhook_events_total", "Webhook events received"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Acquisition
        Box::new(ACQUISITIONS.clone()),
        Box::new(ACQUISITION_DURATION.clone()),
        Box::new(CANDIDATES_FOUND.clone()),
        Box::new(UPGRADES.clone()),
        // Providers
        Box::new(PROVIDER_SEARCH_FAILURES.clone()),
        Box::new(DOWNLOADS.clone()),
        Box::new(VERIFICATION_FAILURES.clone()),
        Box::new(RETRY_ATTEMPTS.clone()),
        // Activation
        Box::new(ACTIVATIONS.clone()),
        // Webhooks
        Box::new(WEBHOOK_EVENTS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        ACQUISITIONS.with_label_values(&["downloaded"]).inc();
        assert!(registry
            .gather()
            .iter()
            .any(|f| f.get_name() == "subfetch_acquisitions_total"));
    }
}
