//! Display surface handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use livedeck_core::sync::SurfaceInfo;

use super::error::{from_sync, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ListSurfacesResponse {
    pub surfaces: Vec<SurfaceInfo>,
}

pub async fn list_surfaces(State(state): State<Arc<AppState>>) -> Json<ListSurfacesResponse> {
    Json(ListSurfacesResponse {
        surfaces: state.hub().surfaces().await,
    })
}

/// Open a window for the surface through the window manager
pub async fn open_surface(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<SurfaceInfo>), ApiError> {
    let info = state.hub().open_surface(&id).await.map_err(from_sync)?;
    Ok((StatusCode::CREATED, Json(info)))
}

pub async fn close_surface(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.hub().close_surface(&id).await.map_err(from_sync)?;
    Ok(StatusCode::NO_CONTENT)
}
