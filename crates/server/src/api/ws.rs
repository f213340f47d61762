//! WebSocket transports: display surfaces and the dashboard event stream.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use livedeck_core::{EventBus, SurfaceSignal};

use crate::metrics::{
    EVENT_STREAM_CONNECTIONS_ACTIVE, EVENT_STREAM_LAG_EVENTS, SURFACE_CONNECTIONS_ACTIVE,
    SURFACE_CONNECTIONS_TOTAL,
};
use crate::state::AppState;

/// Display surface upgrade handler.
pub async fn surface_handler(
    ws: WebSocketUpgrade,
    Path(surface_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_surface(socket, surface_id, state))
}

/// Bridge one display surface to the sync hub.
///
/// Outbound sync messages are written as JSON text frames. Inbound text
/// frames must be surface signals (`{"type":"ready"}`, `next`, `prev`,
/// `closed`); anything else is logged and ignored.
async fn handle_surface(socket: WebSocket, surface_id: String, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let connection = state.hub().attach(&surface_id).await;
    let inbound = connection.inbound.clone();
    let mut outbound = connection.outbound;

    SURFACE_CONNECTIONS_TOTAL.inc();
    SURFACE_CONNECTIONS_ACTIVE.inc();
    info!("Surface {} connected", surface_id);

    let send_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("Surface send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize sync message: {}", e),
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<SurfaceSignal>(&text) {
                Ok(signal) => {
                    let closing = signal == SurfaceSignal::Closed;
                    if !inbound.send(signal).await {
                        warn!("Sync hub stopped, dropping surface {}", surface_id);
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                Err(e) => debug!("Ignoring unknown surface message {:?}: {}", text.as_str(), e),
            },
            Ok(Message::Close(_)) => {
                debug!("Surface {} requested close", surface_id);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Surface {} receive error: {}", surface_id, e);
                break;
            }
        }
    }

    send_task.abort();
    state.hub().detach(&surface_id, &inbound).await;
    SURFACE_CONNECTIONS_ACTIVE.dec();
    info!("Surface {} disconnected", surface_id);
}

/// Dashboard event stream upgrade handler.
pub async fn events_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_events(socket, state))
}

/// Forward every bus event as a named JSON payload.
async fn handle_events(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.events().subscribe();

    EVENT_STREAM_CONNECTIONS_ACTIVE.inc();
    info!("Event stream client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event.to_named_payload()) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            debug!("Event stream send failed, client disconnected");
                            break;
                        }
                    }
                    Err(e) => error!("Failed to serialize event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event stream client lagged, skipped {} events", n);
                    EVENT_STREAM_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed");
                    break;
                }
            }
        }
    });

    // Client messages are not expected; read until close.
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Event stream receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    EVENT_STREAM_CONNECTIONS_ACTIVE.dec();
    info!("Event stream client disconnected");
}
