use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{account, explain, files, handlers, ingest, middleware::metrics_middleware, sessions, surfaces, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Backend account
        .route("/account", get(account::get_account))
        .route("/live-rooms/recent", get(account::recent_live_rooms))
        // Sessions
        .route("/sessions", post(sessions::create_session))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/active", get(sessions::get_active_session))
        .route("/sessions/checkpoint", post(sessions::checkpoint))
        .route("/sessions/{id}", get(sessions::get_session))
        .route("/sessions/{id}", delete(sessions::delete_session))
        .route("/sessions/{id}/activate", post(sessions::activate_session))
        .route("/sessions/{id}/stats", get(sessions::get_stats))
        .route("/sessions/{id}/viewer-url", get(sessions::get_viewer_url))
        // Product files
        .route("/files", post(files::import_file))
        .route("/files", get(files::list_files))
        .route("/files/{id}", delete(files::delete_file))
        .route("/files/{id}/quota", put(files::set_quota))
        // Ingestion and scripts
        .route("/ingest", post(ingest::ingest))
        .route("/scripts/generate", post(ingest::generate_scripts))
        // Narration
        .route("/explain", get(explain::get_state))
        .route("/explain/start", post(explain::start))
        .route("/explain/end", post(explain::end))
        .route("/explain/next", post(explain::next))
        .route("/explain/prev", post(explain::prev))
        .route("/explain/pause", post(explain::pause))
        .route("/explain/resume", post(explain::resume))
        .route("/explain/prepare", post(explain::prepare))
        .route("/explain/stop", post(explain::stop))
        .route("/explain/auto-advance", put(explain::set_auto_advance))
        // Display surfaces
        .route("/surfaces", get(surfaces::list_surfaces))
        .route("/surfaces/{id}/open", post(surfaces::open_surface))
        .route("/surfaces/{id}/close", post(surfaces::close_surface))
        .with_state(Arc::clone(&state));

    let ws_routes = Router::new()
        .route("/surface/{id}", get(ws::surface_handler))
        .route("/events", get(ws::events_handler))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/ws", ws_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
