// src/types/debug.rs

use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugTab {
    #[default]
    Preview,
    Request,
    Response,
}

/// Request/response trace shown in the debug panel.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugData {
    pub request: Option<serde_json::Value>,
    pub response: Option<String>,
    pub timestamp: Option<String>,
    pub preview_request: Option<String>,
    pub preview_timestamp: Option<String>,
    pub active_tab: DebugTab,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorInfo {
    pub error: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiErrorInfo {
    pub fn new(error: impl Into<String>, status: Option<u16>) -> Self {
        let error = error.into();
        let details = if error.contains("HTTP error") || status.is_some() {
            Some("server returned an error status code".to_string())
        } else if error.contains("error sending request") || error.contains("connect") {
            Some("network connection failed or server did not respond".to_string())
        } else {
            None
        };

        Self {
            error,
            timestamp: crate::db::iso_now(),
            status,
            details,
        }
    }

    pub fn to_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.error.clone())
    }
}
