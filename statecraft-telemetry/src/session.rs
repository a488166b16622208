//! Identity and session state.
//!
//! The durable fields survive reloads; the server-assigned session id never
//! does. Consent and backend enablement are independent booleans: a false
//! backend `enabled` never prevents local capture.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::IDENTITY_STORAGE_KEY;
use crate::{DurableStore, StoreError};

/// Identity fields persisted across reloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionFields {
    /// Stable anonymous identifier for this device/player.
    pub user_id: Option<String>,
    pub game_version: Option<String>,
    /// Experiment-condition tag for A/B analysis.
    pub treatment: Option<String>,
    pub consented: bool,
    /// Wall-clock epoch ms of the current session start; used to compute
    /// elapsed duration for the partial summary.
    pub session_start_time: Option<u64>,
    /// Opaque experiment-progress marker owned by the host application.
    pub experiment_progress: Option<String>,
}

/// Full runtime session state: durable fields plus ephemeral session data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub fields: SessionFields,
    /// Server-assigned session identifier; null before a session starts and
    /// after it ends. Never persisted.
    pub session_id: Option<String>,
    /// Backend-reported acceptance flag. Informational only: local queuing
    /// proceeds regardless, and only server-side acceptance is gated.
    pub enabled: bool,
}

/// Generate a new random UUID-v4-shaped anonymous identifier.
#[must_use]
pub fn generate_user_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Load persisted identity fields, falling back to defaults when absent or
/// unreadable. A corrupt record is dropped rather than propagated.
pub fn load(store: &dyn DurableStore) -> SessionFields {
    match store.get(IDENTITY_STORAGE_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("discarding corrupt identity record: {e}");
            SessionFields::default()
        }),
        Ok(None) => SessionFields::default(),
        Err(e) => {
            log::warn!("identity record unreadable: {e}");
            SessionFields::default()
        }
    }
}

/// Persist the identity fields.
///
/// # Errors
///
/// Returns an error if serialization or the store write fails.
pub fn persist(store: &dyn DurableStore, fields: &SessionFields) -> Result<(), StoreError> {
    let body = serde_json::to_string(fields).map_err(|e| StoreError::Write(e.to_string()))?;
    store.set(IDENTITY_STORAGE_KEY, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        map: RefCell<HashMap<String, String>>,
    }

    impl DurableStore for MemoryStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.map.borrow().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.map.borrow_mut().insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.map.borrow_mut().remove(key);
            Ok(())
        }
    }

    #[test]
    fn generated_ids_are_uuid_v4_shaped() {
        let id = generate_user_id();
        assert_eq!(id.len(), 36);
        let parts: Vec<_> = id.split('-').collect();
        assert_eq!(
            parts.iter().map(|p| p.len()).collect::<Vec<_>>(),
            [8, 4, 4, 4, 12]
        );
        assert!(id.chars().all(|c| c == '-' || c.is_ascii_hexdigit()));
        assert!(parts[2].starts_with('4'));
        assert!(matches!(
            parts[3].chars().next(),
            Some('8' | '9' | 'a' | 'b')
        ));
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(generate_user_id(), generate_user_id());
    }

    #[test]
    fn fields_round_trip_through_the_store() {
        let store = MemoryStore::default();
        let fields = SessionFields {
            user_id: Some("u1".to_string()),
            game_version: Some("1.4.0".to_string()),
            treatment: Some("baseline".to_string()),
            consented: true,
            session_start_time: Some(12_345),
            experiment_progress: Some("wave-2".to_string()),
        };
        persist(&store, &fields).unwrap();
        assert_eq!(load(&store), fields);
    }

    #[test]
    fn missing_or_corrupt_records_fall_back_to_defaults() {
        let store = MemoryStore::default();
        assert_eq!(load(&store), SessionFields::default());

        store.set(IDENTITY_STORAGE_KEY, "{{nope").unwrap();
        assert_eq!(load(&store), SessionFields::default());
    }

    #[test]
    fn partial_records_fill_missing_fields_with_defaults() {
        let store = MemoryStore::default();
        store
            .set(IDENTITY_STORAGE_KEY, r#"{"userId":"u9"}"#)
            .unwrap();
        let fields = load(&store);
        assert_eq!(fields.user_id.as_deref(), Some("u9"));
        assert!(!fields.consented);
        assert_eq!(fields.session_start_time, None);
    }
}
