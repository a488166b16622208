//! Centralized tuning constants for the telemetry pipeline.
//!
//! These values define the delivery behavior of the queue and flush engine.
//! Keeping them together ensures that delivery semantics can only be
//! adjusted via code changes reviewed in version control.

// Queue sizing -------------------------------------------------------------

/// Maximum number of entries sent in a single flush request.
pub const BATCH_SIZE: usize = 25;

/// Hard cap on the in-memory queue. When exceeded, the queue truncates to
/// the most recent [`BATCH_SIZE`] entries: recency over completeness.
pub const MAX_QUEUE_SIZE: usize = 200;

// Flush scheduling ---------------------------------------------------------

/// Backstop auto-flush interval. Size-triggered flushes usually fire first
/// under load.
pub const FLUSH_INTERVAL_MS: u32 = 5_000;

/// Escalating retry delays after consecutive flush failures. Once the
/// schedule is exhausted, retries continue at the final delay forever.
pub const BACKOFF_SCHEDULE_MS: [u32; 5] = [1_000, 2_000, 5_000, 15_000, 30_000];

// Durable storage ----------------------------------------------------------

/// Queue backups older than this are discarded unread on restore.
pub const BACKUP_RETENTION_MS: u64 = 24 * 60 * 60 * 1_000;

pub const BACKUP_STORAGE_KEY: &str = "statecraft.telemetry.backup";
pub const IDENTITY_STORAGE_KEY: &str = "statecraft.telemetry.identity";

// Backend endpoints --------------------------------------------------------

pub const STATUS_PATH: &str = "/api/log/status";
pub const SESSION_START_PATH: &str = "/api/log/session/start";
pub const BATCH_PATH: &str = "/api/log/batch";
pub const SUMMARY_PATH: &str = "/api/log/summary";
