//! Browser implementations of the pipeline's clock and task spawner.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use statecraft_telemetry::{Clock, Spawn};

use crate::dom;

/// Wall-clock time and timers backed by the browser event loop.
pub struct BrowserClock;

#[async_trait(?Send)]
impl Clock for BrowserClock {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // epoch ms fit u64 until far future
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    fn now_iso(&self) -> String {
        js_sys::Date::new_0().to_iso_string().into()
    }

    async fn sleep_ms(&self, ms: u32) {
        let clamped = i32::try_from(ms).unwrap_or(i32::MAX);
        if let Err(e) = dom::sleep_ms(clamped).await {
            dom::console_error(&format!(
                "telemetry timer failed: {}",
                dom::js_error_message(&e)
            ));
        }
    }
}

/// Fire-and-forget task start on the browser microtask queue.
pub struct BrowserSpawner;

impl Spawn for BrowserSpawner {
    fn spawn(&self, fut: Pin<Box<dyn Future<Output = ()>>>) {
        wasm_bindgen_futures::spawn_local(fut);
    }
}
