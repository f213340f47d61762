//! Session history API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use livedeck_core::gateway::{CreateLiveRequest, LiveStats};
use livedeck_core::{LiveSession, SessionSummary};

use super::error::{api_error, bad_request, from_gateway, from_session, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a session
#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    /// Existing broadcast id. When absent a live room is created through the
    /// gateway.
    pub id: Option<String>,
    pub title: String,
    /// When blank, the logged-in backend account is used.
    #[serde(default)]
    pub account_ref: String,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub scheduled_end_time: Option<DateTime<Utc>>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionSummary>,
    pub active_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckpointResponse {
    pub saved: usize,
}

#[derive(Debug, Serialize)]
pub struct ViewerUrlResponse {
    pub url: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a session and make it active
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSessionBody>,
) -> Result<(StatusCode, Json<SessionSummary>), ApiError> {
    if body.title.trim().is_empty() {
        return Err(bad_request("title must not be empty"));
    }

    let id = match body.id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => {
            let request = CreateLiveRequest {
                title: body.title.clone(),
                cover_url: body.cover_url,
                start_time: body.scheduled_start_time.map(|t| t.to_rfc3339()),
                end_time: body.scheduled_end_time.map(|t| t.to_rfc3339()),
            };
            let id = state
                .gateway()
                .create_live_room(&request)
                .await
                .map_err(from_gateway)?;
            info!("Created live room {} ({})", id, body.title);
            id
        }
    };

    let account_ref = if body.account_ref.trim().is_empty() {
        logged_in_account_ref(&state).await
    } else {
        body.account_ref
    };

    let session = LiveSession::new(id, body.title, account_ref, body.scheduled_start_time);
    state.controller().reset().await;
    let summary = state.store().create_session(session).await;
    state.store().checkpoint_best_effort().await;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// List session history, most recent first
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<ListSessionsResponse> {
    Json(ListSessionsResponse {
        sessions: state.store().list().await,
        active_id: state.store().active_id().await,
    })
}

/// Get a session with its products and scripts
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LiveSession>, ApiError> {
    state
        .store()
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("session not found: {}", id)))
}

/// Get the active session
pub async fn get_active_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LiveSession>, ApiError> {
    state
        .store()
        .active_session()
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "no active session"))
}

/// Make a stored session active; narration restarts from the first item
pub async fn activate_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    state.store().activate(&id).await.map_err(from_session)?;
    state.controller().reset().await;

    state
        .store()
        .list()
        .await
        .into_iter()
        .find(|s| s.id == id)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("session not found: {}", id)))
}

/// Delete a session from history
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let was_active = state.store().active_id().await.as_deref() == Some(id.as_str());
    state.store().delete(&id).await.map_err(from_session)?;
    if was_active {
        state.controller().reset().await;
    }
    state.store().checkpoint_best_effort().await;
    Ok(StatusCode::NO_CONTENT)
}

/// Real-time audience and sales figures for a session's broadcast
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LiveStats>, ApiError> {
    require_session(&state, &id).await?;
    state
        .gateway()
        .live_stats(&id)
        .await
        .map(Json)
        .map_err(from_gateway)
}

/// Public viewer page for a session's broadcast
pub async fn get_viewer_url(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ViewerUrlResponse>, ApiError> {
    require_session(&state, &id).await?;
    let url = state
        .gateway()
        .viewer_url(&id)
        .await
        .map_err(from_gateway)?;
    Ok(Json(ViewerUrlResponse { url }))
}

/// Write session history to persistence
pub async fn checkpoint(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CheckpointResponse>, ApiError> {
    state
        .store()
        .checkpoint()
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(CheckpointResponse {
        saved: state.store().list().await.len(),
    }))
}

async fn require_session(state: &AppState, id: &str) -> Result<(), ApiError> {
    if state.store().get(id).await.is_some() {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("session not found: {}", id),
        ))
    }
}

/// Account reference of the logged-in backend account, or empty when the
/// login cannot be verified. Session creation never fails on this lookup.
async fn logged_in_account_ref(state: &AppState) -> String {
    match state.gateway().verify_login().await {
        Ok(account) if account.logged_in => account.account_ref.unwrap_or_default(),
        Ok(_) => {
            warn!("Backend login not verified; session has no account reference");
            String::new()
        }
        Err(e) => {
            warn!("Account lookup failed: {}", e);
            String::new()
        }
    }
}
