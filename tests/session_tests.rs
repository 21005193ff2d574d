// Integration tests for the capture session state machine
//
// These tests verify start preconditions, rollback on acquisition failure,
// secondary-source degradation, pause gating, and idempotent stop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use streamscribe::{
    AudioChunk, BackoffPolicy, CaptureError, CaptureSession, ChunkSource, ConnectivityGate,
    DeliveryError, SessionConfig, SessionState, TranscriptionEndpoint,
};
use tokio::sync::mpsc;

/// Endpoint whose scripted responses repeat their last entry once exhausted.
struct ScriptedEndpoint {
    responses: StdMutex<VecDeque<Result<String, DeliveryError>>>,
    calls: AtomicUsize,
}

impl ScriptedEndpoint {
    fn new(responses: Vec<Result<String, DeliveryError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: StdMutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionEndpoint for ScriptedEndpoint {
    async fn deliver(
        &self,
        _payload: &[u8],
        _captured_at: DateTime<Utc>,
    ) -> Result<String, DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("more".to_string()))
    }
}

/// Source that emits a fixed set of chunks, or fails to start on request.
struct ScriptedSource {
    chunks: Vec<Vec<u8>>,
    failure: Option<CaptureError>,
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl ScriptedSource {
    fn new(chunks: Vec<Vec<u8>>) -> (Box<Self>, Arc<AtomicBool>, Arc<AtomicBool>) {
        let started = Arc::new(AtomicBool::new(false));
        let stopped = Arc::new(AtomicBool::new(false));
        let source = Box::new(Self {
            chunks,
            failure: None,
            started: Arc::clone(&started),
            stopped: Arc::clone(&stopped),
        });
        (source, started, stopped)
    }

    fn failing(error: CaptureError) -> (Box<Self>, Arc<AtomicBool>, Arc<AtomicBool>) {
        let started = Arc::new(AtomicBool::new(false));
        let stopped = Arc::new(AtomicBool::new(false));
        let source = Box::new(Self {
            chunks: Vec::new(),
            failure: Some(error),
            started: Arc::clone(&started),
            stopped: Arc::clone(&stopped),
        });
        (source, started, stopped)
    }
}

#[async_trait]
impl ChunkSource for ScriptedSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        if let Some(failure) = self.failure.take() {
            return Err(failure);
        }

        self.started.store(true, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        let chunks = self.chunks.clone();
        tokio::spawn(async move {
            for payload in chunks {
                let chunk = AudioChunk {
                    payload,
                    captured_at: Utc::now(),
                };
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.stopped.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Source whose sender is held by the test, so chunk arrival is scripted
/// from outside.
struct ManualSource {
    sender: Arc<StdMutex<Option<mpsc::Sender<AudioChunk>>>>,
    stopped: Arc<AtomicBool>,
}

impl ManualSource {
    fn new() -> (Box<Self>, Arc<StdMutex<Option<mpsc::Sender<AudioChunk>>>>) {
        let sender = Arc::new(StdMutex::new(None));
        let source = Box::new(Self {
            sender: Arc::clone(&sender),
            stopped: Arc::new(AtomicBool::new(false)),
        });
        (source, sender)
    }
}

#[async_trait]
impl ChunkSource for ManualSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        let (tx, rx) = mpsc::channel(16);
        *self.sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        self.sender.lock().unwrap().take();
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "manual"
    }
}

fn test_config() -> SessionConfig {
    SessionConfig {
        endpoint_url: String::new(),
        chunk_duration: Duration::from_millis(100),
        marker_interval: Duration::from_secs(30),
        request_timeout: Duration::from_secs(5),
        max_attempts: 3,
        backoff: BackoffPolicy {
            base: Duration::from_millis(10),
            multiplier: 2,
            cap: Duration::from_millis(40),
        },
    }
}

fn session_with(endpoint: Arc<ScriptedEndpoint>) -> (CaptureSession, Arc<ConnectivityGate>) {
    let gate = Arc::new(ConnectivityGate::new(true));
    let session = CaptureSession::with_endpoint(test_config(), Arc::clone(&gate), endpoint);
    (session, gate)
}

async fn wait_until(label: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", label);
}

#[tokio::test]
async fn test_start_requires_configured_endpoint() {
    let gate = Arc::new(ConnectivityGate::new(true));
    let mut session = CaptureSession::new(test_config(), gate);
    let (primary, started, _) = ScriptedSource::new(vec![]);

    let result = session.start(primary, None).await;

    assert!(matches!(result, Err(CaptureError::EndpointNotConfigured)));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(
        !started.load(Ordering::SeqCst),
        "precondition failure must not acquire sources"
    );
}

#[tokio::test]
async fn test_start_without_audio_track_rolls_back_to_idle() {
    let (mut session, _gate) = session_with(ScriptedEndpoint::new(vec![]));
    let (primary, _, stopped) = ScriptedSource::failing(CaptureError::NoAudioTrack);

    let result = session.start(primary, None).await;

    assert!(matches!(result, Err(CaptureError::NoAudioTrack)));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(
        stopped.load(Ordering::SeqCst),
        "failed source must be released"
    );
    assert!(session.session_id().is_none());
}

#[tokio::test]
async fn test_secondary_failure_is_non_fatal() {
    let (mut session, _gate) = session_with(ScriptedEndpoint::new(vec![]));
    let (primary, _, _) = ScriptedSource::new(vec![]);
    let (secondary, _, sec_stopped) = ScriptedSource::failing(CaptureError::SourceStart {
        source_name: "scripted".to_string(),
        message: "permission denied".to_string(),
    });

    let result = session.start(primary, Some(secondary)).await;

    assert!(result.is_ok());
    assert_eq!(session.state(), SessionState::Recording);
    assert!(session.secondary_warning().is_some());
    assert!(sec_stopped.load(Ordering::SeqCst));

    let stats = session.stats().await;
    assert!(stats.secondary_warning.is_some());

    session.stop().await;
}

#[tokio::test]
async fn test_chunks_flow_from_source_to_endpoint() {
    let endpoint = ScriptedEndpoint::new(vec![Ok("hello".to_string()), Ok("world".to_string())]);
    let (mut session, _gate) = session_with(Arc::clone(&endpoint));
    let (primary, _, _) = ScriptedSource::new(vec![b"a".to_vec(), b"b".to_vec()]);

    session.start(primary, None).await.unwrap();

    wait_until_delivered(&session, 2).await;

    assert_eq!(session.transcript_text().await, "[00:00] hello world");
    let stats = session.stats().await;
    assert_eq!(stats.delivered_chunks, 2);
    assert_eq!(stats.transcript_segments, 2);

    session.stop().await;
}

#[tokio::test]
async fn test_zero_length_segments_never_reach_the_queue() {
    let endpoint = ScriptedEndpoint::new(vec![Ok("only".to_string())]);
    let (mut session, _gate) = session_with(Arc::clone(&endpoint));
    let (primary, _, _) = ScriptedSource::new(vec![Vec::new(), b"x".to_vec(), Vec::new()]);

    session.start(primary, None).await.unwrap();

    let probe = Arc::clone(&endpoint);
    wait_until("1 delivery", || probe.call_count() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(endpoint.call_count(), 1, "empty segments are discarded");
    session.stop().await;
}

#[tokio::test]
async fn test_pause_gates_chunk_production_without_resetting_timeline() {
    let endpoint = ScriptedEndpoint::new(vec![Ok("after-resume".to_string())]);
    let (mut session, _gate) = session_with(Arc::clone(&endpoint));
    let (primary, sender) = ManualSource::new();

    session.start(primary, None).await.unwrap();
    session.pause();
    assert_eq!(session.state(), SessionState::Paused);

    // Chunks arriving while paused are not produced into the pipeline.
    let tx = sender.lock().unwrap().clone().unwrap();
    tx.send(AudioChunk {
        payload: b"dropped".to_vec(),
        captured_at: Utc::now(),
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(endpoint.call_count(), 0);

    session.resume();
    assert_eq!(session.state(), SessionState::Recording);

    tx.send(AudioChunk {
        payload: b"kept".to_vec(),
        captured_at: Utc::now(),
    })
    .await
    .unwrap();

    let probe = Arc::clone(&endpoint);
    wait_until("post-resume delivery", || probe.call_count() == 1).await;

    session.stop().await;
}

#[tokio::test]
async fn test_pause_and_resume_are_noops_in_other_states() {
    let (mut session, _gate) = session_with(ScriptedEndpoint::new(vec![]));

    session.pause();
    assert_eq!(session.state(), SessionState::Idle);
    session.resume();
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_stop_is_idempotent_and_releases_sources() {
    let (mut session, _gate) = session_with(ScriptedEndpoint::new(vec![]));
    let (primary, _, stopped) = ScriptedSource::new(vec![]);

    session.start(primary, None).await.unwrap();
    assert_eq!(session.state(), SessionState::Recording);

    session.stop().await;
    assert_eq!(session.state(), SessionState::Idle);
    assert!(stopped.load(Ordering::SeqCst));

    // Stop from Idle is always safe.
    session.stop().await;
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_stop_drops_undelivered_chunks() {
    // Every attempt fails, so the queue holds chunks when the session stops.
    let endpoint = ScriptedEndpoint::new(vec![
        Err(DeliveryError::Network("down".to_string())),
        Err(DeliveryError::Network("down".to_string())),
        Err(DeliveryError::Network("down".to_string())),
    ]);
    let (mut session, _gate) = session_with(Arc::clone(&endpoint));
    let (primary, sender) = ManualSource::new();

    session.start(primary, None).await.unwrap();

    let tx = sender.lock().unwrap().clone().unwrap();
    for payload in [b"a".to_vec(), b"b".to_vec()] {
        tx.send(AudioChunk {
            payload,
            captured_at: Utc::now(),
        })
        .await
        .unwrap();
    }

    let probe = Arc::clone(&endpoint);
    wait_until("first attempt", || probe.call_count() >= 1).await;

    session.stop().await;
    let calls_at_stop = endpoint.call_count();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        endpoint.call_count(),
        calls_at_stop,
        "no deliveries after stop"
    );

    let stats = session.stats().await;
    assert_eq!(stats.queued_chunks, 0);
    assert_eq!(stats.state, SessionState::Idle);
}

#[tokio::test]
async fn test_restart_resets_transcript_and_timeline() {
    let endpoint = ScriptedEndpoint::new(vec![Ok("first".to_string())]);
    let (mut session, _gate) = session_with(Arc::clone(&endpoint));
    let (primary, _, _) = ScriptedSource::new(vec![b"a".to_vec()]);

    session.start(primary, None).await.unwrap();
    wait_until_delivered(&session, 1).await;
    assert!(session.transcript_text().await.contains("first"));
    let first_id = session.session_id().unwrap().to_string();

    // Restarting replaces the transcript and the session identity.
    let (primary, _, _) = ScriptedSource::new(vec![]);
    session.start(primary, None).await.unwrap();
    assert_eq!(session.transcript_text().await, "");
    assert_ne!(session.session_id().unwrap(), first_id);

    session.stop().await;
}

#[tokio::test]
async fn test_explicit_retry_resumes_a_stalled_queue() {
    let endpoint = ScriptedEndpoint::new(vec![
        Err(DeliveryError::Network("down".to_string())),
        Err(DeliveryError::Network("down".to_string())),
        Err(DeliveryError::Network("down".to_string())),
        Ok("recovered".to_string()),
    ]);
    let (mut session, _gate) = session_with(Arc::clone(&endpoint));
    let (primary, _, _) = ScriptedSource::new(vec![b"a".to_vec()]);

    session.start(primary, None).await.unwrap();

    let probe = Arc::clone(&endpoint);
    wait_until("3 failed attempts", || probe.call_count() == 3).await;
    wait_until_stats_stalled(&session).await;

    assert!(session.retry_delivery().await);

    let probe = Arc::clone(&endpoint);
    wait_until("recovery call", || probe.call_count() == 4).await;
    wait_until_delivered(&session, 1).await;

    assert_eq!(session.transcript_text().await, "[00:00] recovered");
    let stats = session.stats().await;
    assert!(!stats.stalled);
    assert!(stats.notice.is_none());

    session.stop().await;
}

async fn wait_until_stats_stalled(session: &CaptureSession) {
    for _ in 0..500 {
        if session.stats().await.stalled {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for stall");
}

async fn wait_until_delivered(session: &CaptureSession, count: usize) {
    for _ in 0..500 {
        if session.stats().await.delivered_chunks == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {} deliveries", count);
}
