//! Settings types.

use serde::{Deserialize, Serialize};

/// What happens to the optimistic message when a submission fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Drop the provisional message (and an otherwise empty provisional session).
    #[default]
    Remove,
    /// Keep the message, marked failed with the error text.
    MarkFailed,
}

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChronosSettings {
    /// Backend connection.
    pub api: ApiSettings,
    /// Submission limits and failure handling.
    pub submission: SubmissionSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Backend connection settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL including the API prefix.
    pub base_url: String,
    /// TCP connect timeout in milliseconds. Streams have no read timeout.
    pub connect_timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            connect_timeout_ms: 10_000,
        }
    }
}

/// Submission validation and failure handling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionSettings {
    /// Maximum attachments per submission.
    pub max_attachments: usize,
    /// Maximum size of a single attachment in bytes.
    pub max_attachment_bytes: u64,
    /// Fate of the optimistic message on failure.
    pub failure_policy: FailurePolicy,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            max_attachments: 20,
            max_attachment_bytes: 25 * 1024 * 1024,
            failure_policy: FailurePolicy::Remove,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
