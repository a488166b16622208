//! The telemetry data model: one observed gameplay event.

use serde::{Deserialize, Serialize};

/// Who initiated an event: the player or the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Player,
    System,
}

/// A scalar event value. The wire payload is always flat: structured input
/// is serialized to its JSON string at construction, never at flush time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl LogValue {
    /// Flatten an arbitrary JSON value to a scalar. Scalars pass through;
    /// arrays, objects, and null become their JSON serialization as text.
    #[must_use]
    pub fn flatten(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map_or_else(|| Self::Text(n.to_string()), Self::Number),
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<&str> for LogValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for LogValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for LogValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for LogValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for LogValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for LogValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<serde_json::Value> for LogValue {
    fn from(value: serde_json::Value) -> Self {
        Self::flatten(&value)
    }
}

/// Optional contextual fields attached to an entry by the producer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    pub screen: Option<String>,
    pub day: Option<u32>,
    pub role: Option<String>,
    pub comments: Option<String>,
}

/// One observed event, immutable after creation.
///
/// `game_version` and `treatment` are copied from session state at the
/// moment the entry is created, not looked up at flush time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: String,
    pub user_id: String,
    pub game_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment: Option<String>,
    pub source: LogSource,
    pub action: String,
    pub value: LogValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_screen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: LogValue) -> LogEntry {
        LogEntry {
            timestamp: "2026-08-31T12:00:00.000Z".to_string(),
            user_id: "u1".to_string(),
            game_version: "1.4.0".to_string(),
            treatment: Some("control".to_string()),
            source: LogSource::Player,
            action: "slider_moved".to_string(),
            value,
            current_screen: None,
            day: None,
            role: None,
            comments: None,
        }
    }

    #[test]
    fn scalars_pass_through_flattening() {
        assert_eq!(LogValue::from(json!(true)), LogValue::Bool(true));
        assert_eq!(LogValue::from(json!(3.5)), LogValue::Number(3.5));
        assert_eq!(
            LogValue::from(json!("ready")),
            LogValue::Text("ready".to_string())
        );
    }

    #[test]
    fn structured_values_flatten_to_json_text() {
        let structured = json!({"axis": "economy", "position": 42});
        let flattened = LogValue::from(structured.clone());
        assert_eq!(flattened, LogValue::Text(structured.to_string()));

        let listed = LogValue::from(json!([1, 2, 3]));
        assert_eq!(listed, LogValue::Text("[1,2,3]".to_string()));

        assert_eq!(LogValue::from(json!(null)), LogValue::Text("null".to_string()));
    }

    #[test]
    fn wire_shape_is_camel_case_and_flat() {
        let wire = serde_json::to_value(entry(LogValue::Number(7.0))).unwrap();
        assert_eq!(wire["userId"], "u1");
        assert_eq!(wire["gameVersion"], "1.4.0");
        assert_eq!(wire["source"], "player");
        assert_eq!(wire["value"], 7.0);
        // Absent context fields are omitted entirely rather than sent null.
        assert!(wire.get("currentScreen").is_none());
        assert!(wire.get("comments").is_none());
    }

    #[test]
    fn structured_value_never_nests_on_the_wire() {
        let value = LogValue::from(json!({"nested": {"deep": 1}}));
        let wire = serde_json::to_value(entry(value)).unwrap();
        assert!(wire["value"].is_string());
        // Round-tripping the string yields the original structure.
        let text = wire["value"].as_str().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["nested"]["deep"], 1);
    }

    #[test]
    fn entries_deserialize_from_wire_form() {
        let wire = r#"{
            "timestamp": "2026-08-31T12:00:00.000Z",
            "userId": "u2",
            "gameVersion": "1.4.0",
            "source": "system",
            "action": "day_advanced",
            "value": 3,
            "day": 3
        }"#;
        let parsed: LogEntry = serde_json::from_str(wire).unwrap();
        assert_eq!(parsed.source, LogSource::System);
        assert_eq!(parsed.value, LogValue::Number(3.0));
        assert_eq!(parsed.day, Some(3));
        assert_eq!(parsed.treatment, None);
    }
}
