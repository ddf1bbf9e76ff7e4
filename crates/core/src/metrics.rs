//! Prometheus metrics for the upload pool.
//!
//! This module provides metrics for:
//! - Item outcomes (done, error, aborted) and upload durations
//! - Batch runs by terminal state
//! - Workers currently executing an upload

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Item Metrics
// =============================================================================

/// Items finished, by status.
pub static ITEMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("uploader_items_total", "Total items finished by status"),
        &["status"], // "done", "error", "aborted"
    )
    .unwrap()
});

/// Upload duration in seconds.
pub static ITEM_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "uploader_item_duration_seconds",
            "Duration of a single item upload",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["status"], // "done", "error"
    )
    .unwrap()
});

// =============================================================================
// Pool Metrics
// =============================================================================

/// Batches finished, by terminal state.
pub static BATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("uploader_batches_total", "Total batches finished"),
        &["result"], // "completed", "aborted"
    )
    .unwrap()
});

/// Workers currently running an upload.
pub static WORKERS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "uploader_workers_active",
        "Number of workers currently uploading an item",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ITEMS_TOTAL.clone()),
        Box::new(ITEM_DURATION.clone()),
        Box::new(BATCHES_TOTAL.clone()),
        Box::new(WORKERS_ACTIVE.clone()),
    ]
}
