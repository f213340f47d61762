//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ingestion (products added, invalid ids, skipped chunks and batches)
//! - Narration (explain calls, countdown completions)
//! - Screen sync (pushes by kind)
//! - Backend gateway and text generator requests

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Ingestion Metrics
// =============================================================================

/// Products validated and added to a cart.
pub static INGEST_PRODUCTS_ADDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "livedeck_ingest_products_added_total",
        "Total products added to a broadcast cart",
    )
    .unwrap()
});

/// Product ids dropped by the backend as invalid.
pub static INGEST_INVALID_IDS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "livedeck_ingest_invalid_ids_total",
        "Total product ids rejected as invalid during detail lookup",
    )
    .unwrap()
});

/// Chunks or batches skipped after exhausting retries.
pub static INGEST_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "livedeck_ingest_failures_total",
            "Total skipped ingestion steps",
        ),
        &["stage"], // "fetch_details", "add_to_cart", "append_to_session"
    )
    .unwrap()
});

/// Ingestion runs by outcome.
pub static INGEST_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("livedeck_ingest_runs_total", "Total ingestion runs"),
        &["result"], // "complete", "partial"
    )
    .unwrap()
});

// =============================================================================
// Narration Metrics
// =============================================================================

/// Explain begin/end calls by result.
pub static EXPLAIN_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("livedeck_explain_calls_total", "Total explain begin/end calls"),
        &["operation", "result"], // result: "ok", "self_healed", "rate_limited", "error"
    )
    .unwrap()
});

/// Countdowns that ran to zero, by phase.
pub static COUNTDOWN_COMPLETIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "livedeck_countdown_completions_total",
            "Total countdowns that reached zero",
        ),
        &["phase"], // "prepare", "explain", "rest"
    )
    .unwrap()
});

// =============================================================================
// Screen Sync Metrics
// =============================================================================

/// Messages pushed to display surfaces.
pub static SYNC_PUSHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "livedeck_sync_pushes_total",
            "Total messages pushed to display surfaces",
        ),
        &["kind", "result"], // result: "sent", "dropped"
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// Backend request duration in seconds.
pub static GATEWAY_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "livedeck_gateway_request_duration_seconds",
            "Duration of commerce backend requests",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Text generation requests by result.
pub static SCRIPT_GENERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "livedeck_script_generations_total",
            "Total narration scripts produced",
        ),
        &["source"], // "generator", "fallback"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Ingestion
        Box::new(INGEST_PRODUCTS_ADDED.clone()),
        Box::new(INGEST_INVALID_IDS.clone()),
        Box::new(INGEST_FAILURES.clone()),
        Box::new(INGEST_RUNS.clone()),
        // Narration
        Box::new(EXPLAIN_CALLS.clone()),
        Box::new(COUNTDOWN_COMPLETIONS.clone()),
        // Sync
        Box::new(SYNC_PUSHES.clone()),
        // External services
        Box::new(GATEWAY_REQUEST_DURATION.clone()),
        Box::new(SCRIPT_GENERATIONS.clone()),
    ]
}
