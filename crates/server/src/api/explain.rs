//! Narration control handlers.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use livedeck_core::session::NarrationItem;
use livedeck_core::{ControllerSnapshot, CyclePhase, SwitchOutcome};

use super::error::{from_explain, ApiError};
use crate::state::AppState;

/// Optional product for start/end; defaults to the item under the pointer.
#[derive(Debug, Default, Deserialize)]
pub struct ProductBody {
    #[serde(default)]
    pub product_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AutoAdvanceBody {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct PhaseResponse {
    pub phase: CyclePhase,
}

#[derive(Debug, Serialize)]
pub struct ExplainStateResponse {
    #[serde(flatten)]
    pub snapshot: ControllerSnapshot,
    pub current: Option<NarrationItem>,
    pub total: usize,
}

pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<ExplainStateResponse> {
    let controller = state.controller();
    Json(ExplainStateResponse {
        snapshot: controller.snapshot().await,
        current: controller.current_item().await,
        total: state.store().view().narration_len().await,
    })
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ProductBody>>,
) -> Result<Json<PhaseResponse>, ApiError> {
    let product_id = body.and_then(|Json(b)| b.product_id);
    let phase = state
        .controller()
        .start(product_id)
        .await
        .map_err(from_explain)?;
    Ok(Json(PhaseResponse { phase }))
}

pub async fn end(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ProductBody>>,
) -> Result<Json<PhaseResponse>, ApiError> {
    let product_id = body.and_then(|Json(b)| b.product_id);
    let phase = state
        .controller()
        .end(product_id)
        .await
        .map_err(from_explain)?;
    Ok(Json(PhaseResponse { phase }))
}

/// Move the pointer forward. A time-gated refusal is reported in the body,
/// not as an error.
pub async fn next(State(state): State<Arc<AppState>>) -> Json<SwitchOutcome> {
    Json(state.controller().switch_next().await)
}

pub async fn prev(State(state): State<Arc<AppState>>) -> Json<SwitchOutcome> {
    Json(state.controller().switch_prev().await)
}

pub async fn pause(State(state): State<Arc<AppState>>) -> Result<Json<PhaseResponse>, ApiError> {
    let phase = state.controller().pause().await.map_err(from_explain)?;
    Ok(Json(PhaseResponse { phase }))
}

pub async fn resume(State(state): State<Arc<AppState>>) -> Result<Json<PhaseResponse>, ApiError> {
    let phase = state.controller().resume().await.map_err(from_explain)?;
    Ok(Json(PhaseResponse { phase }))
}

/// Count down to the scheduled start, then start narrating
pub async fn prepare(State(state): State<Arc<AppState>>) -> Result<Json<PhaseResponse>, ApiError> {
    let phase = state.controller().prepare().await.map_err(from_explain)?;
    Ok(Json(PhaseResponse { phase }))
}

/// Cancel countdowns and pending chains, go idle
pub async fn stop(State(state): State<Arc<AppState>>) -> Json<PhaseResponse> {
    state.controller().stop().await;
    Json(PhaseResponse {
        phase: state.controller().phase().await,
    })
}

pub async fn set_auto_advance(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AutoAdvanceBody>,
) -> Json<ControllerSnapshot> {
    state.controller().set_auto_advance(body.enabled).await;
    Json(state.controller().snapshot().await)
}
