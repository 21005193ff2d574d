use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One entry in the assembled transcript: a timestamp marker or a text
/// segment, in capture order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEvent {
    Marker { elapsed_secs: u64 },
    Segment { text: String, received_at: DateTime<Utc> },
}

/// Exportable transcript document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptExport {
    pub created_at: DateTime<Utc>,
    pub text: String,
}

/// Append-only transcript with timestamp markers at a bounded cadence.
///
/// A `[mm:ss]` marker precedes a segment when it is the first append since
/// session start (forced) or when at least `marker_interval` of capture time
/// has elapsed since the last marker. Elapsed time is supplied by the caller
/// and measured at append time; under upload latency it can lag the true
/// audio position. Reads never mutate state.
pub struct TranscriptAssembler {
    marker_interval: Duration,
    events: Vec<TranscriptEvent>,
    created_at: DateTime<Utc>,
    last_mark_secs: u64,
    has_marker: bool,
}

impl TranscriptAssembler {
    pub fn new(marker_interval: Duration) -> Self {
        Self {
            marker_interval,
            events: Vec::new(),
            created_at: Utc::now(),
            last_mark_secs: 0,
            has_marker: false,
        }
    }

    /// Append a delivered text segment, inserting a timestamp marker first
    /// when the cadence calls for one. Empty text is ignored.
    pub fn append(&mut self, text: &str, elapsed: Duration) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        let elapsed_secs = elapsed.as_secs();
        let due = elapsed_secs.saturating_sub(self.last_mark_secs) >= self.marker_interval.as_secs();
        if !self.has_marker || due {
            self.events.push(TranscriptEvent::Marker { elapsed_secs });
            self.last_mark_secs = elapsed_secs;
            self.has_marker = true;
        }

        self.events.push(TranscriptEvent::Segment {
            text: trimmed.to_string(),
            received_at: Utc::now(),
        });
    }

    /// Render the transcript as display text, markers inline.
    pub fn render(&self) -> String {
        let parts: Vec<String> = self
            .events
            .iter()
            .map(|event| match event {
                TranscriptEvent::Marker { elapsed_secs } => format_marker(*elapsed_secs),
                TranscriptEvent::Segment { text, .. } => text.clone(),
            })
            .collect();
        parts.join(" ")
    }

    pub fn events(&self) -> &[TranscriptEvent] {
        &self.events
    }

    /// Number of text segments appended so far (markers excluded).
    pub fn segment_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TranscriptEvent::Segment { .. }))
            .count()
    }

    pub fn export(&self) -> TranscriptExport {
        TranscriptExport {
            created_at: self.created_at,
            text: self.render(),
        }
    }
}

fn format_marker(elapsed_secs: u64) -> String {
    format!("[{:02}:{:02}]", elapsed_secs / 60, elapsed_secs % 60)
}
