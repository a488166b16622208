//! Statecraft Telemetry Pipeline
//!
//! Platform-agnostic gameplay telemetry for the Statecraft political
//! simulation. This crate provides the event queue, flush engine, identity
//! and session state, unload guard, and partial-summary reporter without any
//! browser or platform-specific dependencies. Platform adapters implement
//! the traits below; `statecraft-web` supplies the browser versions.
//!
//! Nothing in this crate ever surfaces an error to a producer call site:
//! telemetry must never degrade or block the player-facing experience.

#![forbid(unsafe_code)]

pub mod backup;
pub mod constants;
pub mod entry;
pub mod queue;
pub mod service;
pub mod session;
pub mod summary;
pub mod wire;

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use thiserror::Error;

// Re-export commonly used types
pub use entry::{LogContext, LogEntry, LogSource, LogValue};
pub use queue::EventQueue;
pub use service::{ConfigError, FlushOutcome, TelemetryConfig, TelemetryService};
pub use session::{SessionFields, SessionState};
pub use summary::{SessionProgress, SummaryPayload};
pub use wire::{
    BatchRequest, BatchResponse, SessionStartRequest, SessionStartResponse, StatusResponse,
};

/// Failures raised by a [`Transport`] implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed response body: {0}")]
    Body(String),
    #[error("backend refused the payload: {0}")]
    Rejected(String),
}

/// Failures raised by a [`DurableStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("durable store unavailable")]
    Unavailable,
    #[error("durable store read failed: {0}")]
    Read(String),
    #[error("durable store write failed: {0}")]
    Write(String),
}

/// Trait for abstracting JSON HTTP calls.
/// Platform-specific implementations should provide this.
///
/// Futures are not required to be `Send`: the pipeline runs on a
/// single-threaded cooperative event loop (browser wasm or a test executor).
#[async_trait(?Send)]
pub trait Transport {
    /// GET the given URL, returning the response body on a 2xx status.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-2xx status, or an
    /// unreadable body.
    async fn get_json(&self, url: &str) -> Result<String, TransportError>;

    /// POST a JSON body to the given URL, returning the response body on a
    /// 2xx status.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-2xx status, or an
    /// unreadable body.
    async fn post_json(&self, url: &str, body: String) -> Result<String, TransportError>;
}

/// One-shot, fire-and-forget delivery that must survive page teardown.
///
/// The contract is "never block teardown, never guarantee delivery": the
/// returned flag only reports whether the payload was handed off, and no
/// response is ever observed. Browser implementations use the beacon API.
pub trait BeaconTransport {
    fn send_best_effort(&self, url: &str, body: &str) -> bool;
}

/// Small key-value durable store surviving reloads.
/// Backed by `localStorage` in the browser and by an in-memory map in tests.
pub trait DurableStore {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be accessed.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is refused (for example on quota).
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be accessed.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Wall-clock time plus delayed task resumption.
#[async_trait(?Send)]
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// ISO-8601 timestamp for wire payloads.
    fn now_iso(&self) -> String;

    /// Resume the calling task after `ms` milliseconds. Retry backoff waits
    /// go through here so they are event-loop timers, never busy-waits.
    async fn sleep_ms(&self, ms: u32);
}

/// Fire-and-forget task start for size-triggered flushes.
pub trait Spawn {
    fn spawn(&self, fut: Pin<Box<dyn Future<Output = ()>>>);
}
