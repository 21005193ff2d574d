//! Error types for streamscribe.

use thiserror::Error;

/// Errors raised while starting a capture session.
///
/// All of these abort the start attempt synchronously with full resource
/// rollback; the session returns to `Idle`.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no delivery endpoint configured")]
    EndpointNotConfigured,

    #[error("no audio track captured")]
    NoAudioTrack,

    #[error("capture source '{source_name}' failed to start: {message}")]
    SourceStart { source_name: String, message: String },

    #[error("failed to initialize delivery endpoint: {0}")]
    Endpoint(String),
}

/// A failed delivery attempt for a single chunk.
///
/// Every variant is transient: the uploader retries per the backoff policy
/// and degrades to a stalled (recoverable) queue on exhaustion. Delivery
/// errors never abort the capture session.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server responded {status}: {body}")]
    Status { status: u16, body: String },
}
