use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session lifecycle
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::close_session),
        )
        .route("/sessions/:session_id/events", get(handlers::session_events))
        .route("/sessions/:session_id/reset", post(handlers::reset_session))
        // Upload and download
        .route(
            "/sessions/:session_id/files/:file_name",
            post(handlers::submit_file),
        )
        .route("/sessions/:session_id/download", get(handlers::download))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
