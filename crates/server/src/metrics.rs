//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the livedeck server:
//! - HTTP request metrics (latency, counts)
//! - Display surface and dashboard WebSocket connections
//! - Narration state (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
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

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "livedeck_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("livedeck_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "livedeck_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Display surfaces currently connected.
pub static SURFACE_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "livedeck_surface_connections_active",
        "Number of connected display surfaces",
    )
    .unwrap()
});

/// Display surface connections since startup.
pub static SURFACE_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "livedeck_surface_connections_total",
        "Total display surface connections since startup",
    )
    .unwrap()
});

/// Active dashboard event stream connections.
pub static EVENT_STREAM_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "livedeck_event_stream_connections_active",
        "Number of connected dashboard event streams",
    )
    .unwrap()
});

/// Dashboard event stream lag (client fell behind the bus).
pub static EVENT_STREAM_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "livedeck_event_stream_lag_events_total",
        "Event stream lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Narration Metrics (collected dynamically)
// =============================================================================

/// Products in the active session.
pub static SESSION_PRODUCTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "livedeck_session_products",
        "Products in the active session",
    )
    .unwrap()
});

/// Narration pointer position.
pub static NARRATION_INDEX: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("livedeck_narration_index", "Current narration position").unwrap()
});

/// 1 while a product is being explained.
pub static NARRATION_EXPLAINING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "livedeck_narration_explaining",
        "Whether a product is being explained (1) or not (0)",
    )
    .unwrap()
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
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(SURFACE_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(SURFACE_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(EVENT_STREAM_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(EVENT_STREAM_LAG_EVENTS.clone()))
        .unwrap();

    // Narration
    registry
        .register(Box::new(SESSION_PRODUCTS.clone()))
        .unwrap();
    registry
        .register(Box::new(NARRATION_INDEX.clone()))
        .unwrap();
    registry
        .register(Box::new(NARRATION_EXPLAINING.clone()))
        .unwrap();

    // Core metrics (ingestion, gateway, narration, sync)
    for metric in livedeck_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let products = state
        .store()
        .active_session()
        .await
        .map(|s| s.products.len())
        .unwrap_or(0);
    SESSION_PRODUCTS.set(products as i64);

    let snapshot = state.controller().snapshot().await;
    NARRATION_INDEX.set(snapshot.index as i64);
    NARRATION_EXPLAINING.set(if snapshot.phase.explaining_product().is_some() {
        1
    } else {
        0
    });
}

static UUID_PATTERN: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap()
});

static NUMERIC_SEGMENT: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_PATTERN.replace_all(path, "{id}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/files/550e8400-e29b-41d4-a716-446655440000/quota";
        assert_eq!(normalize_path(path), "/api/v1/files/{id}/quota");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/sessions/31415926/activate";
        assert_eq!(normalize_path(path), "/api/v1/sessions/{id}/activate");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        SURFACE_CONNECTIONS_ACTIVE.set(0);
        SESSION_PRODUCTS.set(0);
        livedeck_core::metrics::INGEST_PRODUCTS_ADDED.inc_by(0);

        let output = encode_metrics();

        assert!(output.contains("# HELP"));
        assert!(output.contains("livedeck_http_requests_total"));
        assert!(output.contains("livedeck_http_requests_in_flight"));
        assert!(output.contains("livedeck_surface_connections_active"));
        assert!(output.contains("livedeck_session_products"));
        assert!(output.contains("livedeck_ingest_products_added_total"));
    }
}
