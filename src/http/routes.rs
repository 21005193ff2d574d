use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Capture control
        .route("/capture/start", post(handlers::start_capture))
        .route("/capture/stop", post(handlers::stop_capture))
        .route("/capture/pause", post(handlers::pause_capture))
        .route("/capture/resume", post(handlers::resume_capture))
        .route("/capture/status", get(handlers::capture_status))
        // Transcript access
        .route("/transcript", get(handlers::get_transcript))
        .route("/transcript/export", get(handlers::export_transcript))
        // Pipeline signals
        .route("/connectivity", post(handlers::set_connectivity))
        .route("/delivery/retry", post(handlers::retry_delivery))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
