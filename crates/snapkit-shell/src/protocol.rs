//! Command channel messages.

use serde::{Deserialize, Serialize};

/// Request from the embedding side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Request {
    /// Capture the scene canvas without UI.
    #[serde(rename = "capture")]
    Capture,

    /// Hide UI and keep it hidden until `restoreUI`.
    #[serde(rename = "hideUI")]
    HideUi,

    /// Restore UI hidden by a previous `hideUI`.
    #[serde(rename = "restoreUI")]
    RestoreUi,
}

/// Response sent back for every request, including malformed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn captured(image_data: impl Into<String>) -> Self {
        Self {
            success: true,
            image_data: Some(image_data.into()),
            ..Default::default()
        }
    }

    pub fn hidden(count: usize) -> Self {
        Self {
            success: true,
            hidden_count: Some(count),
            ..Default::default()
        }
    }

    pub fn restored() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"success":false,"error":"failed to serialize response: {e}"}}"#)
        })
    }
}
