use super::backoff::BackoffPolicy;
use super::endpoint::TranscriptionEndpoint;
use super::queue::ChunkQueue;
use crate::transcript::TranscriptAssembler;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Tunables for the delivery loop.
#[derive(Debug, Clone, Copy)]
pub struct UploaderConfig {
    /// Consecutive failures on one chunk before the queue stalls
    pub max_attempts: u32,
    /// Wait schedule between retries of the same chunk
    pub backoff: BackoffPolicy,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Single-flight chunk uploader; the per-session delivery controller.
///
/// Owns all mutable pipeline state: the FIFO queue, the "loop active" guard,
/// the sticky stall notice, and the capture timeline origin used for
/// transcript markers. Constructed fresh for each capture session and
/// cancelled (never reused) when the session stops, so no queue or flag state
/// can leak across sessions.
///
/// The drain loop peeks the head chunk, attempts delivery, and pops only on
/// confirmed success, so transcript segments append in exactly capture order.
/// An atomic guard keeps at most one loop active; wake-ups while a loop runs
/// are no-ops because the active loop observes new tail items itself.
pub struct Uploader {
    queue: ChunkQueue,
    endpoint: Arc<dyn TranscriptionEndpoint>,
    connectivity: watch::Receiver<bool>,
    transcript: Arc<Mutex<TranscriptAssembler>>,
    backoff: BackoffPolicy,
    max_attempts: u32,

    /// Single-flight guard: set while a drain loop is active
    running: AtomicBool,

    /// Set once when the owning session stops; never cleared
    cancelled: AtomicBool,

    /// Interrupts backoff waits on cancellation
    cancel: Notify,

    /// Sticky delivery-failure state (head exhausted its retry budget)
    stalled: AtomicBool,
    notice: Mutex<Option<String>>,

    delivered: AtomicUsize,

    /// Capture timeline origin; transcript marker cadence is measured from here
    started_at: Instant,

    monitor: std::sync::Mutex<Option<JoinHandle<()>>>,
    self_handle: Weak<Uploader>,
}

impl Uploader {
    /// Create the controller and spawn its connectivity monitor.
    ///
    /// Must be called from within a tokio runtime. The capture timeline
    /// starts now.
    pub fn new(
        endpoint: Arc<dyn TranscriptionEndpoint>,
        connectivity: watch::Receiver<bool>,
        transcript: Arc<Mutex<TranscriptAssembler>>,
        config: UploaderConfig,
    ) -> Arc<Self> {
        let uploader = Arc::new_cyclic(|weak| Self {
            queue: ChunkQueue::new(),
            endpoint,
            connectivity: connectivity.clone(),
            transcript,
            backoff: config.backoff,
            max_attempts: config.max_attempts,
            running: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            cancel: Notify::new(),
            stalled: AtomicBool::new(false),
            notice: Mutex::new(None),
            delivered: AtomicUsize::new(0),
            started_at: Instant::now(),
            monitor: std::sync::Mutex::new(None),
            self_handle: weak.clone(),
        });

        // Each offline->online transition wakes the loop, idempotently. The
        // gate only notifies on actual transitions, and a coalesced
        // offline/online pair still ends online, so keying on the latest
        // value never misses a reconnect.
        let task = tokio::spawn({
            let uploader = Arc::clone(&uploader);
            let mut rx = connectivity;
            async move {
                while rx.changed().await.is_ok() {
                    let online = *rx.borrow_and_update();
                    if online {
                        info!("Back online; syncing queued chunks");
                        uploader.resume().await;
                    } else {
                        info!("Offline; buffering chunks locally");
                    }
                }
            }
        });
        if let Ok(mut slot) = uploader.monitor.lock() {
            *slot = Some(task);
        }

        uploader
    }

    /// Append a chunk and wake the drain loop if it is idle.
    ///
    /// Zero-length payloads are rejected (no-op). Returns whether the chunk
    /// was accepted.
    pub async fn enqueue(&self, payload: Vec<u8>, captured_at: DateTime<Utc>) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return false;
        }

        let accepted = self.queue.push(payload, captured_at).await;
        if accepted {
            self.wake();
        }
        accepted
    }

    /// Spawn the drain loop. A no-op if one is already active.
    pub fn wake(&self) {
        if let Some(this) = self.self_handle.upgrade() {
            tokio::spawn(async move {
                this.drain().await;
            });
        }
    }

    /// Re-enter the loop after a connectivity-restored signal or an explicit
    /// retry. The stalled head gets a fresh retry budget.
    pub async fn resume(&self) {
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }

        self.queue.reset_head_retries().await;
        if self.stalled.swap(false, Ordering::SeqCst) {
            self.notice.lock().await.take();
        }
        self.wake();
    }

    /// Stop delivery for good: abandon any backoff wait and drop undelivered
    /// chunks so stale audio cannot append to a later session's transcript.
    pub async fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so a backoff wait that registers after
        // this call still wakes immediately.
        self.cancel.notify_one();

        let dropped = self.queue.clear().await;
        if dropped > 0 {
            info!("Dropped {} undelivered chunks from ended session", dropped);
        }

        if let Ok(mut slot) = self.monitor.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }

    /// The single-flight drain loop.
    async fn drain(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // A loop is already active; it will observe new tail items itself.
            return;
        }

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            if !self.is_online() {
                debug!("Offline; suspending delivery");
                break;
            }
            let Some((payload, captured_at, _)) = self.queue.peek_head().await else {
                break;
            };

            match self.endpoint.deliver(&payload, captured_at).await {
                Ok(text) => {
                    if self.cancelled.load(Ordering::SeqCst) {
                        // Result arrived for an ended session; drop it.
                        break;
                    }

                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        // Terminal success with nothing to append.
                        warn!("Empty transcript for chunk captured at {}", captured_at);
                    } else {
                        let elapsed = self.started_at.elapsed();
                        self.transcript.lock().await.append(trimmed, elapsed);
                    }

                    self.queue.pop_head().await;
                    self.clear_stall().await;
                    self.delivered.fetch_add(1, Ordering::SeqCst);
                }
                Err(err) => {
                    let Some(attempts) = self.queue.record_head_failure().await else {
                        // Queue was cleared mid-attempt (session stopped).
                        continue;
                    };
                    warn!(
                        "Delivery attempt {}/{} failed: {}",
                        attempts, self.max_attempts, err
                    );

                    if attempts >= self.max_attempts {
                        self.raise_stall(format!(
                            "Delivery failed after {} attempts: {}",
                            attempts, err
                        ))
                        .await;
                        break;
                    }

                    let wait = self.backoff.delay(attempts);
                    debug!("Retrying head chunk in {:?}", wait);
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = self.cancel.notified() => {}
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);

        // A chunk enqueued between the final empty peek and the guard release
        // saw the guard up; catch it here.
        if !self.cancelled.load(Ordering::SeqCst)
            && self.is_online()
            && !self.stalled.load(Ordering::SeqCst)
            && !self.queue.is_empty().await
        {
            self.wake();
        }
    }

    async fn raise_stall(&self, message: String) {
        warn!("{}; keeping chunk queued", message);
        // Notice first: observers that see the stall flag must find it set.
        *self.notice.lock().await = Some(message);
        self.stalled.store(true, Ordering::SeqCst);
    }

    async fn clear_stall(&self) {
        if self.stalled.swap(false, Ordering::SeqCst) {
            self.notice.lock().await.take();
            info!("Delivery recovered");
        }
    }

    fn is_online(&self) -> bool {
        *self.connectivity.borrow()
    }

    /// Whether the queue is stalled on a head chunk that exhausted its
    /// retry budget.
    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::SeqCst)
    }

    /// The sticky delivery-failure notice, if raised.
    pub async fn notice(&self) -> Option<String> {
        self.notice.lock().await.clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.len().await
    }
}
