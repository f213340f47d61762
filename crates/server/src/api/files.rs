//! Product file API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use livedeck_core::{ProductFile, Quota};

use super::error::{bad_request, from_catalog, ApiError};
use crate::state::AppState;

/// Request body for importing a product file
#[derive(Debug, Deserialize)]
pub struct ImportFileBody {
    /// Display name, usually the original file name.
    pub name: String,
    /// Raw text content (CSV, TSV or one id per line).
    pub content: String,
    /// Initial per-session quota; every id when absent.
    #[serde(default)]
    pub quota: Option<Quota>,
}

#[derive(Debug, Deserialize)]
pub struct SetQuotaBody {
    pub quota: Quota,
}

#[derive(Debug, Serialize)]
pub struct ListFilesResponse {
    pub files: Vec<ProductFile>,
}

/// Parse and register a product file
pub async fn import_file(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ImportFileBody>,
) -> Result<(StatusCode, Json<ProductFile>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(bad_request("name must not be empty"));
    }

    let parsed = state
        .loader()
        .parse(&body.name, &body.content)
        .map_err(from_catalog)?;
    let mut file = state.files().import(&body.name, parsed).await;

    if let Some(quota) = body.quota {
        file = state
            .files()
            .set_quota(&file.id, quota)
            .await
            .map_err(from_catalog)?;
    }

    Ok((StatusCode::CREATED, Json(file)))
}

/// List imported files in import order
pub async fn list_files(State(state): State<Arc<AppState>>) -> Json<ListFilesResponse> {
    Json(ListFilesResponse {
        files: state.files().list().await,
    })
}

pub async fn set_quota(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SetQuotaBody>,
) -> Result<Json<ProductFile>, ApiError> {
    state
        .files()
        .set_quota(&id, body.quota)
        .await
        .map(Json)
        .map_err(from_catalog)
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.files().remove(&id).await.map_err(from_catalog)?;
    Ok(StatusCode::NO_CONTENT)
}
