//! Browser-only adapter checks; run with `wasm-pack test --headless`.

#![cfg(target_arch = "wasm32")]

use statecraft_telemetry::DurableStore;
use statecraft_web::BrowserStore;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const KEY: &str = "statecraft.test.key";

#[wasm_bindgen_test]
fn browser_store_round_trips() {
    let store = BrowserStore;
    store.set(KEY, "value").unwrap();
    assert_eq!(store.get(KEY).unwrap().as_deref(), Some("value"));
    store.remove(KEY).unwrap();
    assert_eq!(store.get(KEY).unwrap(), None);
}

#[wasm_bindgen_test]
fn removing_an_absent_key_is_not_an_error() {
    let store = BrowserStore;
    assert!(store.remove("statecraft.test.absent").is_ok());
}
