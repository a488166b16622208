//! Request and response bodies for the logging backend.
//!
//! Endpoint shapes, camelCase on the wire:
//! - `GET  /api/log/status`        -> [`StatusResponse`]
//! - `POST /api/log/session/start` -> [`SessionStartRequest`] / [`SessionStartResponse`]
//! - `POST /api/log/batch`         -> [`BatchRequest`] / [`BatchResponse`]
//! - `POST /api/log/summary`       -> [`crate::summary::SummaryPayload`] (beacon only)

use serde::{Deserialize, Serialize};

use crate::entry::LogEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub enabled: bool,
    #[serde(default)]
    pub default_treatment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartRequest {
    pub user_id: String,
    pub game_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartResponse {
    pub success: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub treatment: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub logs: Vec<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub success: bool,
    #[serde(default)]
    pub inserted: Option<u64>,
    /// Per-entry error details; shape owned by the backend.
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Join a base URL and an endpoint path without doubling slashes.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    format!("{trimmed}{path}")
}
