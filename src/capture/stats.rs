use super::session::SessionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Current state of the capture state machine
    pub state: SessionState,

    /// Identifier of the most recent session, if one was started
    pub session_id: Option<String>,

    /// When the session started
    pub started_at: Option<DateTime<Utc>>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Chunks waiting for delivery
    pub queued_chunks: usize,

    /// Chunks confirmed delivered (including empty-text responses)
    pub delivered_chunks: usize,

    /// Text segments appended to the transcript
    pub transcript_segments: usize,

    /// Whether delivery is stalled on a head chunk that exhausted its retries
    pub stalled: bool,

    /// Sticky delivery-failure notice, if raised
    pub notice: Option<String>,

    /// One-time warning when an optional secondary input failed to acquire
    pub secondary_warning: Option<String>,
}
