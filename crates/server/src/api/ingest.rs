//! Ingestion and script generation handlers.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use livedeck_core::{IngestionReport, ScriptReport};

use super::error::{from_catalog, from_ingest, from_session, ApiError};
use crate::state::AppState;

/// Request body for an ingestion run
#[derive(Debug, Deserialize)]
pub struct IngestBody {
    /// Products to add to the active session.
    pub target: usize,
    /// Files to draw from, in order. All imported files when absent.
    #[serde(default)]
    pub file_ids: Option<Vec<String>>,
}

/// Add products from the selected files to the active session's cart
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IngestBody>,
) -> Result<Json<IngestionReport>, ApiError> {
    let files = state
        .files()
        .select(body.file_ids.as_deref())
        .await
        .map_err(from_catalog)?;

    let report = state
        .ingestion()
        .ingest(&files, body.target)
        .await
        .map_err(from_ingest)?;

    if report.partial {
        warn!(
            "Ingestion reached {} of {} products",
            report.success, report.target
        );
    }
    state.store().checkpoint_best_effort().await;
    Ok(Json(report))
}

/// Generate narration scripts for the active session's products
pub async fn generate_scripts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScriptReport>, ApiError> {
    let report = state
        .scripts()
        .generate_for_active(state.store())
        .await
        .map_err(from_session)?;
    state.store().checkpoint_best_effort().await;
    Ok(Json(report))
}
