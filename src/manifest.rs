//! Configuration manifests stored on the device in `conf_info`.
//!
//! The file is a JSON array written by the configuration tool after each
//! upload. The protocol client only decodes it for display; it never edits it.

use serde::{Deserialize, Serialize};

/// One uploaded configuration as recorded in `conf_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationManifest {
    pub name: String,
    pub color_code: String,
    #[serde(default)]
    pub uploaded_at: Option<UploadedAt>,
    /// Total bytes of the configuration's audio files.
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<ButtonLabel>,
}

/// Upload timestamp: epoch milliseconds or a date string, depending on the
/// tool version that wrote the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadedAt {
    EpochMillis(i64),
    Text(String),
}

impl UploadedAt {
    pub fn to_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            UploadedAt::EpochMillis(ms) => chrono::DateTime::from_timestamp_millis(*ms),
            UploadedAt::Text(s) => chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&chrono::Utc)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonLabel {
    #[serde(default)]
    pub label: Option<String>,
}

/// Decode the `conf_info` blob.
pub fn decode_manifests(bytes: &[u8]) -> serde_json::Result<Vec<ConfigurationManifest>> {
    serde_json::from_slice(bytes)
}
