use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::debug;

/// A captured chunk waiting for delivery.
#[derive(Debug, Clone)]
pub struct ChunkItem {
    /// Raw chunk bytes (opaque to the pipeline)
    pub payload: Vec<u8>,

    /// When the chunk was captured
    pub captured_at: DateTime<Utc>,

    /// Failed delivery attempts so far for this item
    pub retry_count: u32,
}

/// FIFO queue of pending chunks.
///
/// Insertion order is capture order. Only the head may be removed, and the
/// uploader removes it only after confirmed delivery, so transcript segments
/// can never appear out of order or twice. The producer appends at the tail
/// and the single consumer mutates the head; one mutex covers both.
pub struct ChunkQueue {
    items: Mutex<VecDeque<ChunkItem>>,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Append a chunk at the tail. Zero-length payloads are rejected (no-op).
    ///
    /// Returns whether the chunk was accepted.
    pub async fn push(&self, payload: Vec<u8>, captured_at: DateTime<Utc>) -> bool {
        if payload.is_empty() {
            debug!("Rejecting zero-length chunk captured at {}", captured_at);
            return false;
        }

        let mut items = self.items.lock().await;
        items.push_back(ChunkItem {
            payload,
            captured_at,
            retry_count: 0,
        });
        true
    }

    /// Snapshot of the head item's payload, capture time, and retry count.
    ///
    /// The item stays queued; it leaves only via `pop_head` after a
    /// confirmed delivery.
    pub async fn peek_head(&self) -> Option<(Vec<u8>, DateTime<Utc>, u32)> {
        let items = self.items.lock().await;
        items
            .front()
            .map(|item| (item.payload.clone(), item.captured_at, item.retry_count))
    }

    /// Remove the head item after confirmed delivery.
    pub async fn pop_head(&self) -> Option<ChunkItem> {
        let mut items = self.items.lock().await;
        items.pop_front()
    }

    /// Record a failed attempt on the head item. Returns its new retry count.
    pub async fn record_head_failure(&self) -> Option<u32> {
        let mut items = self.items.lock().await;
        items.front_mut().map(|item| {
            item.retry_count += 1;
            item.retry_count
        })
    }

    /// Give the head item a fresh retry budget.
    pub async fn reset_head_retries(&self) {
        let mut items = self.items.lock().await;
        if let Some(item) = items.front_mut() {
            item.retry_count = 0;
        }
    }

    /// Drop every queued item. Returns how many were discarded.
    pub async fn clear(&self) -> usize {
        let mut items = self.items.lock().await;
        let dropped = items.len();
        items.clear();
        dropped
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

impl Default for ChunkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_preserves_order() {
        let queue = ChunkQueue::new();

        assert!(queue.push(vec![1], Utc::now()).await);
        assert!(queue.push(vec![2], Utc::now()).await);
        assert!(queue.push(vec![3], Utc::now()).await);

        assert_eq!(queue.len().await, 3);

        let (head, _, retries) = queue.peek_head().await.unwrap();
        assert_eq!(head, vec![1]);
        assert_eq!(retries, 0);

        queue.pop_head().await;
        let (head, _, _) = queue.peek_head().await.unwrap();
        assert_eq!(head, vec![2]);
    }

    #[tokio::test]
    async fn test_zero_length_payload_rejected() {
        let queue = ChunkQueue::new();

        assert!(!queue.push(vec![], Utc::now()).await);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_peek_does_not_remove() {
        let queue = ChunkQueue::new();
        queue.push(vec![9], Utc::now()).await;

        queue.peek_head().await;
        queue.peek_head().await;

        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_head_failure_and_reset() {
        let queue = ChunkQueue::new();
        queue.push(vec![1], Utc::now()).await;

        assert_eq!(queue.record_head_failure().await, Some(1));
        assert_eq!(queue.record_head_failure().await, Some(2));

        queue.reset_head_retries().await;
        let (_, _, retries) = queue.peek_head().await.unwrap();
        assert_eq!(retries, 0);
    }

    #[tokio::test]
    async fn test_clear_reports_dropped_count() {
        let queue = ChunkQueue::new();
        queue.push(vec![1], Utc::now()).await;
        queue.push(vec![2], Utc::now()).await;

        assert_eq!(queue.clear().await, 2);
        assert!(queue.is_empty().await);
    }
}
