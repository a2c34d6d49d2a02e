//! # Provider Metrics
//!
//! Metrics for the Aqua API: requests by object and outcome, request latency and logins.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec};
use std::sync::LazyLock;

static AQUA_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "aqua_scanner_account_aqua_requests_total",
            "Total number of Aqua API requests by object, operation and outcome",
        ),
        &["object", "operation", "outcome"],
    )
    .expect("Failed to create AQUA_REQUESTS_TOTAL metric - this should never happen")
});

static AQUA_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "aqua_scanner_account_aqua_request_duration_seconds",
            "Duration of Aqua API requests in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["object", "operation"],
    )
    .expect("Failed to create AQUA_REQUEST_DURATION metric - this should never happen")
});

static AQUA_LOGINS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "aqua_scanner_account_aqua_logins_total",
            "Total number of Aqua logins by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create AQUA_LOGINS_TOTAL metric - this should never happen")
});

/// Register provider metrics with the registry
pub(crate) fn register_provider_metrics() -> Result<()> {
    REGISTRY.register(Box::new(AQUA_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(AQUA_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(AQUA_LOGINS_TOTAL.clone()))?;
    Ok(())
}

/// Record a finished Aqua API request
///
/// `outcome` is `success` or an `AccessError::kind` label.
pub fn record_aqua_request(object: &str, operation: &str, outcome: &str, duration: f64) {
    AQUA_REQUESTS_TOTAL
        .with_label_values(&[object, operation, outcome])
        .inc();
    AQUA_REQUEST_DURATION
        .with_label_values(&[object, operation])
        .observe(duration);
}

pub fn increment_logins(outcome: &str) {
    AQUA_LOGINS_TOTAL.with_label_values(&[outcome]).inc();
}
