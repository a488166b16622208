#![forbid(unsafe_code)]

//! Browser adapter layer for the Statecraft telemetry pipeline.
//!
//! `statecraft-telemetry` defines the pipeline over platform seams; this
//! crate supplies the browser versions: `fetch` transport, `localStorage`
//! durable store, `navigator.sendBeacon` best-effort delivery, event-loop
//! timers, and the Yew hooks a host application mounts.

pub mod dom;
pub mod hooks;
pub mod runtime;
pub mod storage;
pub mod transport;

use std::rc::Rc;

use statecraft_telemetry::{ConfigError, TelemetryConfig, TelemetryService};

pub use hooks::ProgressProvider;
pub use runtime::{BrowserClock, BrowserSpawner};
pub use storage::BrowserStore;
pub use transport::{FetchTransport, NavigatorBeacon};

/// Construct the telemetry pipeline over the browser adapters. Call once at
/// the application's composition root and pass the instance by reference.
///
/// # Errors
///
/// Returns an error when the tuning values are invalid.
pub fn browser_service(cfg: TelemetryConfig) -> Result<Rc<TelemetryService>, ConfigError> {
    TelemetryService::new(
        cfg,
        Rc::new(FetchTransport),
        Rc::new(NavigatorBeacon),
        Rc::new(BrowserStore),
        Rc::new(BrowserClock),
        Rc::new(BrowserSpawner),
    )
}

/// Route panics to the browser console during development.
#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}
