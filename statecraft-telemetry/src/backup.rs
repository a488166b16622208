//! Durable crash/reload backup of the event queue.
//!
//! A snapshot is written only when a flush attempt fails and cleared on the
//! next successful flush. On restore, a snapshot older than the retention
//! window is discarded unread so stale data is never resurrected
//! indefinitely.

use serde::{Deserialize, Serialize};

use crate::constants::BACKUP_STORAGE_KEY;
use crate::entry::LogEntry;
use crate::{DurableStore, StoreError};

/// The persisted snapshot: write time plus the full queue at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueBackup {
    pub timestamp: u64,
    pub logs: Vec<LogEntry>,
}

/// Persist the current queue after a failed flush.
///
/// # Errors
///
/// Returns an error if serialization or the store write fails.
pub fn save(store: &dyn DurableStore, now_ms: u64, logs: &[LogEntry]) -> Result<(), StoreError> {
    let snapshot = QueueBackup {
        timestamp: now_ms,
        logs: logs.to_vec(),
    };
    let body = serde_json::to_string(&snapshot).map_err(|e| StoreError::Write(e.to_string()))?;
    store.set(BACKUP_STORAGE_KEY, &body)
}

/// Remove any persisted snapshot after a successful flush.
///
/// # Errors
///
/// Returns an error if the store cannot be accessed.
pub fn clear(store: &dyn DurableStore) -> Result<(), StoreError> {
    store.remove(BACKUP_STORAGE_KEY)
}

/// Load the persisted snapshot if one exists and is younger than
/// `retention_ms`. Stale or unreadable snapshots are removed and an empty
/// list returned; they are never replayed.
pub fn restore(store: &dyn DurableStore, now_ms: u64, retention_ms: u64) -> Vec<LogEntry> {
    let raw = match store.get(BACKUP_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            log::warn!("queue backup unreadable: {e}");
            return Vec::new();
        }
    };
    let snapshot: QueueBackup = match serde_json::from_str(&raw) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::warn!("discarding corrupt queue backup: {e}");
            let _ = store.remove(BACKUP_STORAGE_KEY);
            return Vec::new();
        }
    };
    if now_ms.saturating_sub(snapshot.timestamp) > retention_ms {
        log::info!(
            "discarding stale queue backup ({} entries past retention)",
            snapshot.logs.len()
        );
        let _ = store.remove(BACKUP_STORAGE_KEY);
        return Vec::new();
    }
    snapshot.logs
}
