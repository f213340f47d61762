//! Broadcaster account API handlers.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use livedeck_core::gateway::{AccountInfo, RecentLiveRoom};

use super::error::{from_gateway, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RecentRoomsResponse {
    pub rooms: Vec<RecentLiveRoom>,
}

/// Check the configured backend credentials
pub async fn get_account(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AccountInfo>, ApiError> {
    state
        .gateway()
        .verify_login()
        .await
        .map(Json)
        .map_err(from_gateway)
}

/// Live rooms the account used recently
pub async fn recent_live_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RecentRoomsResponse>, ApiError> {
    let rooms = state
        .gateway()
        .recent_live_rooms()
        .await
        .map_err(from_gateway)?;
    Ok(Json(RecentRoomsResponse { rooms }))
}
