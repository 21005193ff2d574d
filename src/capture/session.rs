use super::source::ChunkSource;
use super::stats::SessionStats;
use crate::delivery::{
    BackoffPolicy, ConnectivityGate, HttpEndpoint, TranscriptionEndpoint, Uploader, UploaderConfig,
};
use crate::error::CaptureError;
use crate::transcript::{TranscriptAssembler, TranscriptEvent, TranscriptExport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Capture session state machine: `Idle → Starting → Recording ⇄ Paused`,
/// any state → `Idle` via stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Starting,
    Recording,
    Paused,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Recording => "recording",
            SessionState::Paused => "paused",
        };
        write!(f, "{}", name)
    }
}

/// Configuration for a capture session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delivery destination; starting without one is a precondition error
    pub endpoint_url: String,

    /// Duration of each audio chunk produced by the capture sources
    pub chunk_duration: Duration,

    /// Minimum elapsed capture time between transcript timestamp markers
    pub marker_interval: Duration,

    /// Bound on each delivery request
    pub request_timeout: Duration,

    /// Consecutive failures on one chunk before the queue stalls
    pub max_attempts: u32,

    /// Retry wait schedule
    pub backoff: BackoffPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            chunk_duration: Duration::from_secs(2),
            marker_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// A capture session that manages audio sources, chunk delivery, and
/// transcript assembly.
///
/// Exactly one session is active at a time. All mutable pipeline state lives
/// in a per-session [`Uploader`] controller created on start and destroyed on
/// stop, so nothing leaks between sessions. The assembled transcript of the
/// most recent session stays readable until the next start replaces it.
pub struct CaptureSession {
    config: SessionConfig,
    gate: Arc<ConnectivityGate>,
    endpoint_override: Option<Arc<dyn TranscriptionEndpoint>>,

    state: SessionState,
    session_id: Option<String>,
    started_at: Option<DateTime<Utc>>,

    /// While set, forwarders discard incoming chunks (no production)
    paused: Arc<AtomicBool>,

    transcript: Arc<Mutex<TranscriptAssembler>>,
    uploader: Option<Arc<Uploader>>,

    /// Acquired audio sources; released unconditionally on every exit path
    sources: Vec<Box<dyn ChunkSource>>,
    forward_tasks: Vec<JoinHandle<()>>,

    secondary_warning: Option<String>,
}

impl CaptureSession {
    pub fn new(config: SessionConfig, gate: Arc<ConnectivityGate>) -> Self {
        let marker_interval = config.marker_interval;
        Self {
            config,
            gate,
            endpoint_override: None,
            state: SessionState::Idle,
            session_id: None,
            started_at: None,
            paused: Arc::new(AtomicBool::new(false)),
            transcript: Arc::new(Mutex::new(TranscriptAssembler::new(marker_interval))),
            uploader: None,
            sources: Vec::new(),
            forward_tasks: Vec::new(),
            secondary_warning: None,
        }
    }

    /// Create a session that delivers through the given endpoint instead of
    /// building an HTTP client from the configured URL.
    pub fn with_endpoint(
        config: SessionConfig,
        gate: Arc<ConnectivityGate>,
        endpoint: Arc<dyn TranscriptionEndpoint>,
    ) -> Self {
        let mut session = Self::new(config, gate);
        session.endpoint_override = Some(endpoint);
        session
    }

    /// Start capturing.
    ///
    /// The primary source is mandatory: if it yields no audio, the start
    /// attempt fails, everything acquired so far is rolled back, and the
    /// session returns to `Idle`. The secondary source is optional: failure
    /// to acquire it raises a one-time warning and the session proceeds
    /// without it. A successful start resets the capture timeline and the
    /// transcript. Starting while a session is active restarts it.
    pub async fn start(
        &mut self,
        primary: Box<dyn ChunkSource>,
        secondary: Option<Box<dyn ChunkSource>>,
    ) -> Result<(), CaptureError> {
        // Precondition: a delivery destination must be configured. No state
        // change on failure.
        if self.endpoint_override.is_none() && self.config.endpoint_url.trim().is_empty() {
            return Err(CaptureError::EndpointNotConfigured);
        }

        self.stop().await;

        let endpoint: Arc<dyn TranscriptionEndpoint> = match &self.endpoint_override {
            Some(endpoint) => Arc::clone(endpoint),
            None => Arc::new(
                HttpEndpoint::new(self.config.endpoint_url.trim(), self.config.request_timeout)
                    .map_err(|e| CaptureError::Endpoint(e.to_string()))?,
            ),
        };

        self.state = SessionState::Starting;
        let session_id = format!("capture-{}", uuid::Uuid::new_v4());
        info!("Starting capture session: {}", session_id);

        let mut primary = primary;
        let receiver = match primary.start().await {
            Ok(rx) => rx,
            Err(err) => {
                // Roll back anything the source partially acquired.
                if let Err(stop_err) = primary.stop().await {
                    warn!("Rollback of '{}' failed: {}", primary.name(), stop_err);
                }
                self.state = SessionState::Idle;
                error!("Capture start failed: {}", err);
                return Err(err);
            }
        };
        let mut receivers = vec![receiver];
        self.sources.push(primary);

        self.secondary_warning = None;
        if let Some(mut secondary) = secondary {
            match secondary.start().await {
                Ok(rx) => {
                    receivers.push(rx);
                    self.sources.push(secondary);
                }
                Err(err) => {
                    let warning = format!("Secondary input unavailable: {}", err);
                    warn!("{}; continuing with primary audio only", warning);
                    self.secondary_warning = Some(warning);
                    if let Err(stop_err) = secondary.stop().await {
                        warn!("Rollback of '{}' failed: {}", secondary.name(), stop_err);
                    }
                }
            }
        }

        // Fresh timeline, transcript, and delivery controller for this session.
        self.transcript = Arc::new(Mutex::new(TranscriptAssembler::new(
            self.config.marker_interval,
        )));
        self.paused = Arc::new(AtomicBool::new(false));
        let uploader = Uploader::new(
            endpoint,
            self.gate.subscribe(),
            Arc::clone(&self.transcript),
            UploaderConfig {
                max_attempts: self.config.max_attempts,
                backoff: self.config.backoff,
            },
        );

        for receiver in receivers {
            let uploader = Arc::clone(&uploader);
            let paused = Arc::clone(&self.paused);
            let task = tokio::spawn(async move {
                let mut receiver = receiver;
                while let Some(chunk) = receiver.recv().await {
                    if paused.load(Ordering::SeqCst) {
                        continue;
                    }
                    if chunk.payload.is_empty() {
                        continue;
                    }
                    uploader.enqueue(chunk.payload, chunk.captured_at).await;
                }
            });
            self.forward_tasks.push(task);
        }

        self.uploader = Some(uploader);
        self.session_id = Some(session_id);
        self.started_at = Some(Utc::now());
        self.state = SessionState::Recording;
        info!("Capture session started");

        Ok(())
    }

    /// Pause chunk production without resetting the capture timeline.
    pub fn pause(&mut self) {
        if self.state == SessionState::Recording {
            self.paused.store(true, Ordering::SeqCst);
            self.state = SessionState::Paused;
            info!("Capture paused");
        }
    }

    /// Resume chunk production.
    pub fn resume(&mut self) {
        if self.state == SessionState::Paused {
            self.paused.store(false, Ordering::SeqCst);
            self.state = SessionState::Recording;
            info!("Capture resumed");
        }
    }

    /// Stop capturing. Idempotent and safe from any state.
    ///
    /// Releases every acquired audio source, cancels the uploader (abandoning
    /// any backoff wait and dropping undelivered chunks of this session), and
    /// returns to `Idle`. The transcript stays readable until the next start.
    pub async fn stop(&mut self) {
        for mut source in self.sources.drain(..) {
            if let Err(err) = source.stop().await {
                warn!("Failed to stop source '{}': {}", source.name(), err);
            }
        }
        for task in self.forward_tasks.drain(..) {
            task.abort();
        }
        if let Some(uploader) = self.uploader.take() {
            uploader.cancel().await;
        }
        self.paused.store(false, Ordering::SeqCst);

        if self.state != SessionState::Idle {
            self.state = SessionState::Idle;
            info!("Capture session stopped");
        }
    }

    /// Explicitly re-trigger a stalled delivery queue.
    ///
    /// Returns false when no session pipeline exists.
    pub async fn retry_delivery(&self) -> bool {
        match &self.uploader {
            Some(uploader) => {
                uploader.resume().await;
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn secondary_warning(&self) -> Option<&str> {
        self.secondary_warning.as_deref()
    }

    /// Get current session statistics
    pub async fn stats(&self) -> SessionStats {
        let (queued, delivered, stalled, notice) = match &self.uploader {
            Some(uploader) => (
                uploader.queue_len().await,
                uploader.delivered_count(),
                uploader.is_stalled(),
                uploader.notice().await,
            ),
            None => (0, 0, false, None),
        };

        let duration_secs = self
            .started_at
            .map(|started| {
                Utc::now().signed_duration_since(started).num_milliseconds() as f64 / 1000.0
            })
            .unwrap_or(0.0);

        SessionStats {
            state: self.state,
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            duration_secs,
            queued_chunks: queued,
            delivered_chunks: delivered,
            transcript_segments: self.transcript.lock().await.segment_count(),
            stalled,
            notice,
            secondary_warning: self.secondary_warning.clone(),
        }
    }

    /// Render the assembled transcript as display text.
    pub async fn transcript_text(&self) -> String {
        self.transcript.lock().await.render()
    }

    /// Snapshot of the ordered transcript events.
    pub async fn transcript_events(&self) -> Vec<TranscriptEvent> {
        self.transcript.lock().await.events().to_vec()
    }

    /// Exportable transcript document.
    pub async fn transcript_export(&self) -> TranscriptExport {
        self.transcript.lock().await.export()
    }
}
