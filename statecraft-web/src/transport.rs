//! HTTP and beacon transports over the browser fetch and beacon APIs.

use async_trait::async_trait;
use statecraft_telemetry::{BeaconTransport, Transport, TransportError};
use web_sys::Response;

use crate::dom;

/// JSON transport over `fetch`. A non-2xx status is an error; the flush
/// engine treats it like any other transient transport failure.
pub struct FetchTransport;

async fn read_body(resp: Response) -> Result<String, TransportError> {
    if !resp.ok() {
        return Err(TransportError::Status(resp.status()));
    }
    dom::response_text(&resp)
        .await
        .map_err(|e| TransportError::Body(dom::js_error_message(&e)))
}

#[async_trait(?Send)]
impl Transport for FetchTransport {
    async fn get_json(&self, url: &str) -> Result<String, TransportError> {
        let resp = dom::fetch_get(url)
            .await
            .map_err(|e| TransportError::Network(dom::js_error_message(&e)))?;
        read_body(resp).await
    }

    async fn post_json(&self, url: &str, body: String) -> Result<String, TransportError> {
        let resp = dom::fetch_post_json(url, &body)
            .await
            .map_err(|e| TransportError::Network(dom::js_error_message(&e)))?;
        read_body(resp).await
    }
}

/// One-shot unload-safe delivery via `navigator.sendBeacon`. Returns only
/// whether the payload was handed off; no response is ever observed.
pub struct NavigatorBeacon;

impl BeaconTransport for NavigatorBeacon {
    fn send_best_effort(&self, url: &str, body: &str) -> bool {
        let Some(window) = web_sys::window() else {
            return false;
        };
        window
            .navigator()
            .send_beacon_with_opt_str(url, Some(body))
            .unwrap_or(false)
    }
}
