//! Yew hooks wiring the telemetry pipeline into a running page.
//!
//! `use_telemetry` mounts the session bring-up, the auto-flush backstop
//! loop, and the unload guard. `use_partial_summary_logger` additionally
//! emits a session-in-progress summary on teardown from a host-supplied
//! progress snapshot; the two unload listeners fire independently.

use std::rc::Rc;

use statecraft_telemetry::SessionProgress;
#[cfg(any(target_arch = "wasm32", test))]
use statecraft_telemetry::TelemetryService;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsCast;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::closure::Closure;
#[cfg(target_arch = "wasm32")]
use yew::prelude::*;

#[cfg(target_arch = "wasm32")]
use crate::dom;

/// Host-supplied callback producing the current game progress snapshot.
pub type ProgressProvider = Rc<dyn Fn() -> SessionProgress>;

/// Identity, status, and session bring-up shared by the mount hook.
#[cfg(any(target_arch = "wasm32", test))]
pub(crate) async fn bootstrap_session(svc: &TelemetryService) {
    svc.ensure_user_id();
    svc.refresh_status().await;
    // A refused session start is already logged; gameplay proceeds without.
    let _ = svc.start_session().await;
}

#[cfg(target_arch = "wasm32")]
fn on_pagehide(handler: impl FnMut(web_sys::Event) + 'static) {
    let closure = Closure::<dyn FnMut(web_sys::Event)>::new(handler);
    if let Err(e) =
        dom::window().add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref())
    {
        dom::console_error(&format!(
            "failed to attach pagehide listener: {}",
            dom::js_error_message(&e)
        ));
    }
    // Listener lives for the page lifetime.
    closure.forget();
}

/// Mount-once wiring for the telemetry pipeline.
#[cfg(target_arch = "wasm32")]
#[hook]
pub fn use_telemetry(service: &Rc<TelemetryService>) {
    let svc = Rc::clone(service);
    use_effect_with((), move |()| {
        {
            let svc = Rc::clone(&svc);
            wasm_bindgen_futures::spawn_local(async move {
                bootstrap_session(&svc).await;
            });
        }
        {
            let svc = Rc::clone(&svc);
            wasm_bindgen_futures::spawn_local(async move {
                svc.run_auto_flush().await;
            });
        }
        on_pagehide(move |_event| svc.flush_on_unload());
        || {}
    });
}

/// Emit the partial summary when the page is torn down.
#[cfg(target_arch = "wasm32")]
#[hook]
pub fn use_partial_summary_logger(service: &Rc<TelemetryService>, progress: ProgressProvider) {
    let svc = Rc::clone(service);
    use_effect_with((), move |()| {
        on_pagehide(move |_event| {
            let _ = svc.report_partial_summary(&progress());
        });
        || {}
    });
}
