//! Bounded FIFO buffer of pending log entries.
//!
//! Insertion order is send order. Only the flush engine removes entries;
//! producers append. That single-writer-for-removal split is what lets the
//! pipeline run without locks on a cooperative event loop.

use std::collections::VecDeque;

use crate::entry::LogEntry;

/// Ordered buffer of pending entries, capped at a hard maximum.
///
/// When the cap is exceeded the queue truncates to the most recent
/// batch-size worth of entries: under sustained overload it favors recency
/// over completeness. The truncation is deliberate data loss, not an error.
#[derive(Debug)]
pub struct EventQueue {
    entries: VecDeque<LogEntry>,
    batch_size: usize,
    max_size: usize,
    dropped: u64,
}

impl EventQueue {
    /// Create a queue sending at most `batch_size` entries per flush and
    /// holding at most `max_size` entries overall.
    #[must_use]
    pub fn new(batch_size: usize, max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            batch_size,
            max_size,
            dropped: 0,
        }
    }

    /// Append an entry, enforcing the hard cap.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        self.enforce_cap();
    }

    /// Remove and return up to one batch from the front of the queue.
    pub fn take_batch(&mut self) -> Vec<LogEntry> {
        let count = self.entries.len().min(self.batch_size);
        self.entries.drain(..count).collect()
    }

    /// Re-insert a failed batch at the front, preserving its original order
    /// relative to entries enqueued while it was in flight.
    pub fn requeue_front(&mut self, batch: Vec<LogEntry>) {
        for entry in batch.into_iter().rev() {
            self.entries.push_front(entry);
        }
        self.enforce_cap();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clone the full queue contents, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Total entries discarded by cap enforcement since construction.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    fn enforce_cap(&mut self) {
        if self.entries.len() <= self.max_size {
            return;
        }
        let excess = self.entries.len() - self.batch_size;
        self.entries.drain(..excess);
        self.dropped += excess as u64;
        log::warn!("telemetry queue overflow: dropped {excess} oldest entries");
    }
}
