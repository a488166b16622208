//! `localStorage`-backed durable store for the queue backup and identity
//! record.

use statecraft_telemetry::{DurableStore, StoreError};

use crate::dom;

pub struct BrowserStore;

impl BrowserStore {
    fn storage() -> Result<web_sys::Storage, StoreError> {
        dom::local_storage().map_err(|_| StoreError::Unavailable)
    }
}

impl DurableStore for BrowserStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| StoreError::Read(dom::js_error_message(&e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| StoreError::Write(dom::js_error_message(&e)))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        Self::storage()?
            .remove_item(key)
            .map_err(|e| StoreError::Write(dom::js_error_message(&e)))
    }
}
