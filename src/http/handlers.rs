use super::state::AppState;
use crate::capture::{ChunkSource, SessionStats, WavFileSource};
use crate::error::CaptureError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartCaptureResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,

    /// Set when an optional secondary input failed to acquire
    pub secondary_warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StopCaptureResponse {
    pub status: String,
    pub message: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct CaptureStateResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ConnectivityRequest {
    pub online: bool,
}

#[derive(Debug, Serialize)]
pub struct ConnectivityResponse {
    pub online: bool,

    /// Whether the request was an actual transition
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub triggered: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /capture/start
/// Start a capture session (restarting any active one)
pub async fn start_capture(State(state): State<AppState>) -> impl IntoResponse {
    let chunk_duration = Duration::from_secs(state.capture.chunk_duration_secs);

    let primary: Box<dyn ChunkSource> = Box::new(WavFileSource::new(
        &state.capture.input_path,
        chunk_duration,
    ));
    let secondary: Option<Box<dyn ChunkSource>> = state
        .capture
        .secondary_input_path
        .as_deref()
        .filter(|path| !path.trim().is_empty())
        .map(|path| {
            Box::new(WavFileSource::new(path, chunk_duration)) as Box<dyn ChunkSource>
        });

    let mut session = state.session.write().await;
    match session.start(primary, secondary).await {
        Ok(()) => {
            let session_id = session.session_id().unwrap_or_default().to_string();
            info!("Capture started via API: {}", session_id);
            (
                StatusCode::OK,
                Json(StartCaptureResponse {
                    session_id,
                    status: session.state().to_string(),
                    message: "Capture started".to_string(),
                    secondary_warning: session.secondary_warning().map(str::to_string),
                }),
            )
                .into_response()
        }
        Err(err @ CaptureError::EndpointNotConfigured) => {
            error!("Capture start rejected: {}", err);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to start capture: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to start capture: {}", err),
                }),
            )
                .into_response()
        }
    }
}

/// POST /capture/stop
/// Stop the active capture session (idempotent)
pub async fn stop_capture(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.write().await;
    session.stop().await;
    let stats = session.stats().await;

    (
        StatusCode::OK,
        Json(StopCaptureResponse {
            status: session.state().to_string(),
            message: "Capture stopped".to_string(),
            stats,
        }),
    )
}

/// POST /capture/pause
pub async fn pause_capture(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.write().await;
    session.pause();

    (
        StatusCode::OK,
        Json(CaptureStateResponse {
            status: session.state().to_string(),
        }),
    )
}

/// POST /capture/resume
pub async fn resume_capture(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.write().await;
    session.resume();

    (
        StatusCode::OK,
        Json(CaptureStateResponse {
            status: session.state().to_string(),
        }),
    )
}

/// GET /capture/status
pub async fn capture_status(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    let stats = session.stats().await;

    (StatusCode::OK, Json(stats))
}

/// GET /transcript
/// The assembled transcript as display text (markers inline)
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    session.transcript_text().await
}

/// GET /transcript/export
/// Exportable transcript document
pub async fn export_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    let export = session.transcript_export().await;

    (StatusCode::OK, Json(export))
}

/// POST /connectivity
/// Report an online/offline transition from the connectivity source
pub async fn set_connectivity(
    State(state): State<AppState>,
    Json(req): Json<ConnectivityRequest>,
) -> impl IntoResponse {
    let changed = if req.online {
        state.gate.set_online()
    } else {
        state.gate.set_offline()
    };

    (
        StatusCode::OK,
        Json(ConnectivityResponse {
            online: req.online,
            changed,
        }),
    )
}

/// POST /delivery/retry
/// Explicitly re-trigger a stalled delivery queue
pub async fn retry_delivery(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    let triggered = session.retry_delivery().await;

    (StatusCode::OK, Json(RetryResponse { triggered }))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
