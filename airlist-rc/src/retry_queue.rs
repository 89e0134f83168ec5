//! Bounded retry queue for unresolved lookups
//!
//! FIFO of previously failed resolutions, one entry per broadcast
//! occurrence. Unsuccessful retries re-enter at the tail so distinct
//! failing items take turns instead of the head item being hammered
//! every cycle. Items that reach the attempt limit are discarded with a
//! terminal-failure record (emitted by the caller).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One queued lookup awaiting re-resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryItem {
    pub title: String,
    pub artist: String,
    pub source_id: String,
    /// Retry attempts consumed so far
    pub attempts: u32,
}

/// Bounded idempotent FIFO of retry items
pub struct RetryQueue {
    capacity: usize,
    max_attempts: u32,
    items: VecDeque<RetryItem>,
}

impl RetryQueue {
    pub fn new(capacity: usize, max_attempts: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            max_attempts: max_attempts.max(1),
            items: VecDeque::new(),
        }
    }

    /// Rebuild from a persisted snapshot, head first
    pub fn from_items(capacity: usize, max_attempts: u32, items: Vec<RetryItem>) -> Self {
        let mut queue = Self::new(capacity, max_attempts);
        for item in items.into_iter().take(queue.capacity) {
            queue.items.push_back(item);
        }
        queue
    }

    /// Queue a failed lookup for later re-resolution
    ///
    /// No-op when an item with the same `source_id` is already queued, or
    /// when the queue is full (dropped with a warning, never blocking).
    pub fn enqueue(&mut self, title: &str, artist: &str, source_id: &str) {
        if self.items.iter().any(|item| item.source_id == source_id) {
            tracing::debug!(source_id, "Lookup already queued for retry");
            return;
        }
        if self.items.len() >= self.capacity {
            tracing::warn!(
                capacity = self.capacity,
                title,
                artist,
                "Retry queue full, dropping lookup"
            );
            return;
        }
        tracing::info!(title, artist, source_id, "Queued lookup for retry");
        self.items.push_back(RetryItem {
            title: title.to_string(),
            artist: artist.to_string(),
            source_id: source_id.to_string(),
            attempts: 0,
        });
    }

    /// Pop the head item with its attempt count already incremented
    pub fn pop_head(&mut self) -> Option<RetryItem> {
        let mut item = self.items.pop_front()?;
        item.attempts += 1;
        Some(item)
    }

    /// Re-enqueue an unsuccessfully retried item at the tail
    ///
    /// Returns false (and drops the item) once its attempts are
    /// exhausted; the caller emits the terminal-failure record.
    pub fn requeue(&mut self, item: RetryItem) -> bool {
        if item.attempts >= self.max_attempts {
            tracing::warn!(
                title = %item.title,
                artist = %item.artist,
                attempts = item.attempts,
                "Retry attempts exhausted, discarding"
            );
            return false;
        }
        self.items.push_back(item);
        true
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn depth(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current items, head first, for snapshot persistence
    pub fn items(&self) -> Vec<RetryItem> {
        self.items.iter().cloned().collect()
    }
}
