//! The long-lived telemetry service: producer API, flush engine, session
//! lifecycle, unload guard, and debug surface.
//!
//! One instance is constructed at the application's composition root and
//! passed by reference; there is no global singleton. All mutable state
//! lives behind a single `RefCell` and no borrow is ever held across an
//! await, which is the whole concurrency story on a cooperative event loop:
//! producers only append, and only the flush engine removes.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use thiserror::Error;

use crate::backup;
use crate::constants::{
    BACKOFF_SCHEDULE_MS, BACKUP_RETENTION_MS, BATCH_PATH, BATCH_SIZE, FLUSH_INTERVAL_MS,
    MAX_QUEUE_SIZE, SESSION_START_PATH, STATUS_PATH, SUMMARY_PATH,
};
use crate::entry::{LogContext, LogEntry, LogSource, LogValue};
use crate::queue::EventQueue;
use crate::session::{self, SessionState};
use crate::summary::{self, SessionProgress};
use crate::wire::{
    self, BatchRequest, BatchResponse, SessionStartRequest, SessionStartResponse, StatusResponse,
};
use crate::{BeaconTransport, Clock, DurableStore, Spawn, Transport, TransportError};

/// Tuning for one pipeline instance. Defaults come from [`crate::constants`];
/// tests shrink the sizes to exercise the policies directly.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Backend origin; empty means same-origin relative paths.
    pub base_url: String,
    /// Build tag copied onto every entry.
    pub game_version: String,
    /// Treatment applied when neither storage nor the status endpoint
    /// supplies one.
    pub default_treatment: Option<String>,
    pub batch_size: usize,
    pub max_queue_size: usize,
    pub flush_interval_ms: u32,
    pub backoff_schedule_ms: Vec<u32>,
    pub backup_retention_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            game_version: String::new(),
            default_treatment: None,
            batch_size: BATCH_SIZE,
            max_queue_size: MAX_QUEUE_SIZE,
            flush_interval_ms: FLUSH_INTERVAL_MS,
            backoff_schedule_ms: BACKOFF_SCHEDULE_MS.to_vec(),
            backup_retention_ms: BACKUP_RETENTION_MS,
        }
    }
}

impl TelemetryConfig {
    /// Validate the tuning invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.max_queue_size < self.batch_size {
            return Err(ConfigError::CapBelowBatch {
                max_queue_size: self.max_queue_size,
                batch_size: self.batch_size,
            });
        }
        if self.backoff_schedule_ms.is_empty() {
            return Err(ConfigError::EmptyBackoffSchedule);
        }
        Ok(())
    }
}

/// Errors raised when telemetry configuration invariants are violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("queue cap {max_queue_size} is below batch size {batch_size}")]
    CapBelowBatch {
        max_queue_size: usize,
        batch_size: usize,
    },
    #[error("backoff schedule must not be empty")]
    EmptyBackoffSchedule,
}

/// What a call to [`TelemetryService::flush`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing queued.
    Empty,
    /// Another flush was already in flight and this one was not forced.
    Busy,
    /// The queue was drained; the payload is the number of entries sent.
    Sent(usize),
}

struct Inner {
    queue: EventQueue,
    session: SessionState,
    flushing: bool,
    retry_count: u32,
}

/// The telemetry pipeline host object.
pub struct TelemetryService {
    cfg: TelemetryConfig,
    transport: Rc<dyn Transport>,
    beacon: Rc<dyn BeaconTransport>,
    store: Rc<dyn DurableStore>,
    clock: Rc<dyn Clock>,
    spawner: Rc<dyn Spawn>,
    inner: RefCell<Inner>,
    weak: Weak<TelemetryService>,
}

impl TelemetryService {
    /// Construct the service, restoring persisted identity fields and any
    /// queue backup younger than the retention window.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the tuning values are invalid.
    pub fn new(
        cfg: TelemetryConfig,
        transport: Rc<dyn Transport>,
        beacon: Rc<dyn BeaconTransport>,
        store: Rc<dyn DurableStore>,
        clock: Rc<dyn Clock>,
        spawner: Rc<dyn Spawn>,
    ) -> Result<Rc<Self>, ConfigError> {
        cfg.validate()?;

        let mut fields = session::load(store.as_ref());
        fields.game_version = Some(cfg.game_version.clone());
        if fields.treatment.is_none() {
            fields.treatment = cfg.default_treatment.clone();
        }

        let mut queue = EventQueue::new(cfg.batch_size, cfg.max_queue_size);
        let recovered = backup::restore(store.as_ref(), clock.now_ms(), cfg.backup_retention_ms);
        if !recovered.is_empty() {
            log::info!("recovered {} queued entries from backup", recovered.len());
        }
        for entry in recovered {
            queue.push(entry);
        }

        let inner = Inner {
            queue,
            session: SessionState {
                fields,
                session_id: None,
                enabled: false,
            },
            flushing: false,
            retry_count: 0,
        };

        Ok(Rc::new_cyclic(|weak| Self {
            cfg,
            transport,
            beacon,
            store,
            clock,
            spawner,
            inner: RefCell::new(inner),
            weak: weak.clone(),
        }))
    }

    // Identity & session -----------------------------------------------------

    /// Return the persisted anonymous identifier, creating and persisting a
    /// new one on first use.
    pub fn ensure_user_id(&self) -> String {
        let existing = self.inner.borrow().session.fields.user_id.clone();
        if let Some(id) = existing {
            return id;
        }
        let id = session::generate_user_id();
        let fields = {
            let mut inner = self.inner.borrow_mut();
            inner.session.fields.user_id = Some(id.clone());
            inner.session.fields.clone()
        };
        self.persist_fields(&fields);
        id
    }

    /// Ask the backend whether it currently accepts telemetry and adopt its
    /// default treatment when none is set yet. Failures are logged and
    /// ignored: local capture proceeds regardless of the answer.
    pub async fn refresh_status(&self) {
        let url = wire::join_url(&self.cfg.base_url, STATUS_PATH);
        let body = match self.transport.get_json(&url).await {
            Ok(body) => body,
            Err(e) => {
                log::debug!("status check failed: {e}");
                return;
            }
        };
        let status: StatusResponse = match serde_json::from_str(&body) {
            Ok(status) => status,
            Err(e) => {
                log::warn!("malformed status response: {e}");
                return;
            }
        };
        let fields = {
            let mut inner = self.inner.borrow_mut();
            inner.session.enabled = status.enabled;
            if inner.session.fields.treatment.is_none() && !status.default_treatment.is_empty() {
                inner.session.fields.treatment = Some(status.default_treatment);
                Some(inner.session.fields.clone())
            } else {
                None
            }
        };
        if let Some(fields) = fields {
            self.persist_fields(&fields);
        }
    }

    /// Start a server-side session. On any failure the session id stays
    /// null and gameplay proceeds without one; nothing is thrown.
    ///
    /// Returns whether a session is now active.
    pub async fn start_session(&self) -> bool {
        let request = {
            let inner = self.inner.borrow();
            let Some(user_id) = inner.session.fields.user_id.clone() else {
                log::debug!("session start skipped: no user id yet");
                return false;
            };
            SessionStartRequest {
                user_id,
                game_version: inner.session.fields.game_version.clone().unwrap_or_default(),
                treatment: inner.session.fields.treatment.clone(),
            }
        };
        let Ok(body) = serde_json::to_string(&request) else {
            return false;
        };
        let url = wire::join_url(&self.cfg.base_url, SESSION_START_PATH);
        let reply = match self.transport.post_json(&url, body).await {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("session start failed: {e}");
                return false;
            }
        };
        let parsed: SessionStartResponse = match serde_json::from_str(&reply) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("malformed session start response: {e}");
                return false;
            }
        };
        if !parsed.success {
            log::warn!(
                "session start refused: {}",
                parsed.error.unwrap_or_else(|| "no reason given".to_string())
            );
            return false;
        }
        let Some(session_id) = parsed.session_id else {
            log::warn!("session start response missing session id");
            return false;
        };
        let fields = {
            let mut inner = self.inner.borrow_mut();
            inner.session.session_id = Some(session_id);
            inner.session.fields.session_start_time = Some(self.clock.now_ms());
            if let Some(treatment) = parsed.treatment {
                inner.session.fields.treatment = Some(treatment);
            }
            inner.session.fields.clone()
        };
        self.persist_fields(&fields);
        true
    }

    /// End the active session: emit a terminal `session_end` event, force a
    /// flush, then clear the session id. No-op without an active session.
    pub async fn end_session(&self) {
        if self.inner.borrow().session.session_id.is_none() {
            return;
        }
        self.log_system("session_end", true);
        self.flush(true).await;
        let fields = {
            let mut inner = self.inner.borrow_mut();
            inner.session.session_id = None;
            inner.session.fields.session_start_time = None;
            inner.session.fields.clone()
        };
        self.persist_fields(&fields);
    }

    // Producer API -----------------------------------------------------------

    /// Record a player-initiated event. Fire-and-forget: never throws,
    /// never blocks, silently no-ops until a user id exists.
    pub fn log(&self, action: &str, value: impl Into<LogValue>) {
        self.push_entry(LogSource::Player, action, value.into(), LogContext::default());
    }

    /// Record a player-initiated event with contextual fields.
    pub fn log_with(&self, action: &str, value: impl Into<LogValue>, ctx: LogContext) {
        self.push_entry(LogSource::Player, action, value.into(), ctx);
    }

    /// Record an engine-initiated event.
    pub fn log_system(&self, action: &str, value: impl Into<LogValue>) {
        self.push_entry(LogSource::System, action, value.into(), LogContext::default());
    }

    /// Record an engine-initiated event with contextual fields.
    pub fn log_system_with(&self, action: &str, value: impl Into<LogValue>, ctx: LogContext) {
        self.push_entry(LogSource::System, action, value.into(), ctx);
    }

    fn push_entry(&self, source: LogSource, action: &str, value: LogValue, ctx: LogContext) {
        let trigger = {
            let mut inner = self.inner.borrow_mut();
            let Some(user_id) = inner.session.fields.user_id.clone() else {
                log::debug!("telemetry entry {action:?} skipped: no user id yet");
                return;
            };
            let entry = LogEntry {
                timestamp: self.clock.now_iso(),
                user_id,
                game_version: inner.session.fields.game_version.clone().unwrap_or_default(),
                treatment: inner.session.fields.treatment.clone(),
                source,
                action: action.to_string(),
                value,
                current_screen: ctx.screen,
                day: ctx.day,
                role: ctx.role,
                comments: ctx.comments,
            };
            inner.queue.push(entry);
            inner.queue.len() >= self.cfg.batch_size && !inner.flushing
        };
        if trigger {
            self.request_flush();
        }
    }

    fn request_flush(&self) {
        let Some(svc) = self.weak.upgrade() else {
            return;
        };
        self.spawner.spawn(Box::pin(async move {
            svc.flush(false).await;
        }));
    }

    // Flush engine -----------------------------------------------------------

    /// Drain the queue to the backend in FIFO batches.
    ///
    /// If another flush is in flight and `force` is false, returns
    /// immediately. A failed batch is re-inserted at the front of the queue,
    /// the queue is persisted to the durable store, and the attempt repeats
    /// after an escalating, capped delay. Retries never give up, so this
    /// future resolves only once every queued entry has been accepted.
    pub async fn flush(&self, force: bool) -> FlushOutcome {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.flushing && !force {
                return FlushOutcome::Busy;
            }
            if inner.queue.is_empty() {
                return FlushOutcome::Empty;
            }
            inner.flushing = true;
        }
        let sent = self.drain_queue().await;
        self.inner.borrow_mut().flushing = false;
        FlushOutcome::Sent(sent)
    }

    async fn drain_queue(&self) -> usize {
        let url = wire::join_url(&self.cfg.base_url, BATCH_PATH);
        let mut sent = 0;
        loop {
            let (batch, session_id) = {
                let mut inner = self.inner.borrow_mut();
                (inner.queue.take_batch(), inner.session.session_id.clone())
            };
            if batch.is_empty() {
                return sent;
            }
            match self.post_batch(&url, &batch, session_id).await {
                Ok(()) => {
                    sent += batch.len();
                    self.inner.borrow_mut().retry_count = 0;
                    if let Err(e) = backup::clear(self.store.as_ref()) {
                        log::warn!("failed to clear queue backup: {e}");
                    }
                }
                Err(e) => {
                    log::warn!("batch send failed ({} entries): {e}", batch.len());
                    let (attempt, snapshot) = {
                        let mut inner = self.inner.borrow_mut();
                        inner.queue.requeue_front(batch);
                        let attempt = inner.retry_count;
                        inner.retry_count = inner.retry_count.saturating_add(1);
                        (attempt, inner.queue.snapshot())
                    };
                    if let Err(e) =
                        backup::save(self.store.as_ref(), self.clock.now_ms(), &snapshot)
                    {
                        log::warn!("failed to persist queue backup: {e}");
                    }
                    let delay = backoff_delay(&self.cfg.backoff_schedule_ms, attempt);
                    log::debug!("retrying batch in {delay} ms (attempt {})", attempt + 1);
                    self.clock.sleep_ms(delay).await;
                }
            }
        }
    }

    async fn post_batch(
        &self,
        url: &str,
        batch: &[LogEntry],
        session_id: Option<String>,
    ) -> Result<(), TransportError> {
        let request = BatchRequest {
            logs: batch.to_vec(),
            session_id,
        };
        let body =
            serde_json::to_string(&request).map_err(|e| TransportError::Body(e.to_string()))?;
        let reply = self.transport.post_json(url, body).await?;
        let parsed: BatchResponse =
            serde_json::from_str(&reply).map_err(|e| TransportError::Body(e.to_string()))?;
        if parsed.success {
            Ok(())
        } else {
            Err(TransportError::Rejected(
                parsed.error.unwrap_or_else(|| "success=false".to_string()),
            ))
        }
    }

    /// Backstop timer: flush every configured interval when the queue is
    /// non-empty. Runs until the hosting task is torn down.
    pub async fn run_auto_flush(&self) {
        loop {
            self.clock.sleep_ms(self.cfg.flush_interval_ms).await;
            if !self.inner.borrow().queue.is_empty() {
                self.flush(false).await;
            }
        }
    }

    // Unload paths -----------------------------------------------------------

    /// Last-resort delivery on page teardown: hand the full queue to the
    /// best-effort transport in one request. Synchronous by construction.
    /// The in-memory queue is left untouched and there is no retry; this
    /// path gets exactly one attempt.
    pub fn flush_on_unload(&self) {
        let request = {
            let inner = self.inner.borrow();
            if inner.queue.is_empty() {
                return;
            }
            BatchRequest {
                logs: inner.queue.snapshot(),
                session_id: inner.session.session_id.clone(),
            }
        };
        let Ok(body) = serde_json::to_string(&request) else {
            return;
        };
        let url = wire::join_url(&self.cfg.base_url, BATCH_PATH);
        let handed_off = self.beacon.send_best_effort(&url, &body);
        log::debug!(
            "unload flush handed off {} entries (accepted: {handed_off})",
            request.logs.len()
        );
    }

    /// Send the session-in-progress summary on teardown. Silently skips
    /// unless the game started and has not finished, a game id and role
    /// exist, and a valid session is active.
    ///
    /// Returns whether a payload was handed to the best-effort transport.
    pub fn report_partial_summary(&self, progress: &SessionProgress) -> bool {
        let payload = {
            let inner = self.inner.borrow();
            summary::build_summary(&inner.session, progress, self.clock.now_ms())
        };
        let Some(payload) = payload else {
            log::debug!("partial summary skipped: preconditions not met");
            return false;
        };
        let Ok(body) = serde_json::to_string(&payload) else {
            return false;
        };
        let url = wire::join_url(&self.cfg.base_url, SUMMARY_PATH);
        self.beacon.send_best_effort(&url, &body)
    }

    // State accessors --------------------------------------------------------

    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.inner.borrow().session.fields.user_id.clone()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.inner.borrow().session.session_id.clone()
    }

    #[must_use]
    pub fn treatment(&self) -> Option<String> {
        self.inner.borrow().session.fields.treatment.clone()
    }

    /// Backend-reported acceptance flag from the last status check.
    #[must_use]
    pub fn telemetry_enabled(&self) -> bool {
        self.inner.borrow().session.enabled
    }

    #[must_use]
    pub fn consented(&self) -> bool {
        self.inner.borrow().session.fields.consented
    }

    pub fn set_consented(&self, consented: bool) {
        let fields = {
            let mut inner = self.inner.borrow_mut();
            inner.session.fields.consented = consented;
            inner.session.fields.clone()
        };
        self.persist_fields(&fields);
    }

    #[must_use]
    pub fn experiment_progress(&self) -> Option<String> {
        self.inner.borrow().session.fields.experiment_progress.clone()
    }

    pub fn set_experiment_progress(&self, progress: Option<String>) {
        let fields = {
            let mut inner = self.inner.borrow_mut();
            inner.session.fields.experiment_progress = progress;
            inner.session.fields.clone()
        };
        self.persist_fields(&fields);
    }

    // Debug surface ----------------------------------------------------------

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Clone of the pending queue, oldest first.
    #[must_use]
    pub fn queued_entries(&self) -> Vec<LogEntry> {
        self.inner.borrow().queue.snapshot()
    }

    pub fn clear_queue(&self) {
        self.inner.borrow_mut().queue.clear();
    }

    /// Entries discarded by queue-cap enforcement since construction.
    #[must_use]
    pub fn dropped_entries(&self) -> u64 {
        self.inner.borrow().queue.dropped()
    }

    fn persist_fields(&self, fields: &session::SessionFields) {
        if let Err(e) = session::persist(self.store.as_ref(), fields) {
            log::warn!("failed to persist identity fields: {e}");
        }
    }
}

/// Delay before retry number `attempt` (zero-based). Past the end of the
/// schedule the final delay repeats forever.
fn backoff_delay(schedule: &[u32], attempt: u32) -> u32 {
    let last = schedule.len().saturating_sub(1);
    let idx = usize::try_from(attempt).map_or(last, |a| a.min(last));
    schedule.get(idx).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_escalates_then_holds_at_the_cap() {
        let schedule = [1_000, 2_000, 5_000, 15_000, 30_000];
        let delays: Vec<_> = (0..8).map(|n| backoff_delay(&schedule, n)).collect();
        assert_eq!(
            delays,
            [1_000, 2_000, 5_000, 15_000, 30_000, 30_000, 30_000, 30_000]
        );
        for pair in delays.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn config_validation_rejects_bad_tuning() {
        let ok = TelemetryConfig::default();
        assert!(ok.validate().is_ok());

        let mut zero_batch = TelemetryConfig::default();
        zero_batch.batch_size = 0;
        assert_eq!(zero_batch.validate(), Err(ConfigError::ZeroBatchSize));

        let mut tiny_cap = TelemetryConfig::default();
        tiny_cap.max_queue_size = tiny_cap.batch_size - 1;
        assert!(matches!(
            tiny_cap.validate(),
            Err(ConfigError::CapBelowBatch { .. })
        ));

        let mut no_backoff = TelemetryConfig::default();
        no_backoff.backoff_schedule_ms.clear();
        assert_eq!(no_backoff.validate(), Err(ConfigError::EmptyBackoffSchedule));
    }
}
