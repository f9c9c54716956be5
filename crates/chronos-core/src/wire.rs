//! Wire types for the chat HTTP API.
//!
//! Field names follow the backend's JSON schema. Each DTO converts into the
//! corresponding domain type; conversion is where server records become
//! [`MessageState::Committed`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{MessageId, SessionId, UploadId};
use crate::messages::{Message, MessageState, Role};
use crate::session::{ExtractionStatus, SessionSummary, UploadArtifact};

/// A message as returned by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageDto {
    /// Message ID.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Text body.
    #[serde(default)]
    pub content: Option<String>,
    /// Structured tool payload.
    #[serde(default)]
    pub raw_payload: Option<Value>,
    /// Per-session ordering key.
    #[serde(default)]
    pub sequence_index: i64,
    /// Creation time.
    #[serde(with = "crate::time::required")]
    pub created_at: DateTime<Utc>,
}

impl MessageDto {
    /// Convert to a committed domain message with no uploads attached.
    pub fn into_message(self) -> Message {
        Message {
            id: self.id,
            role: self.role,
            content: self.content,
            raw_payload: self.raw_payload,
            sequence_index: Some(self.sequence_index),
            created_at: self.created_at,
            state: MessageState::Committed,
            uploads: Vec::new(),
        }
    }
}

/// An upload artifact as returned by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadArtifactDto {
    /// Upload ID.
    pub id: UploadId,
    /// Owning session.
    pub session_id: SessionId,
    /// Message the file was submitted with.
    #[serde(default)]
    pub message_id: Option<MessageId>,
    /// Filename as supplied by the user.
    pub original_filename: String,
    /// Storage path relative to the backend upload root.
    pub stored_path: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Size on disk.
    #[serde(default)]
    pub size_bytes: Option<u64>,
    /// Extraction progress.
    #[serde(default)]
    pub extraction_status: ExtractionStatus,
    /// Extraction output.
    #[serde(default)]
    pub extraction_result: Option<Value>,
    /// Upload time.
    #[serde(with = "crate::time::required")]
    pub created_at: DateTime<Utc>,
}

impl From<UploadArtifactDto> for UploadArtifact {
    fn from(dto: UploadArtifactDto) -> Self {
        Self {
            id: dto.id,
            session_id: dto.session_id,
            message_id: dto.message_id,
            filename: dto.original_filename,
            stored_path: dto.stored_path,
            mime_type: dto.mime_type,
            size_bytes: dto.size_bytes,
            extraction_status: dto.extraction_status,
            extraction_result: dto.extraction_result,
            created_at: dto.created_at,
        }
    }
}

/// Terminal payload of a submission: the full committed turn.
///
/// Identical to the body of a non-streaming submit response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Canonical session ID (may differ from the provisional one).
    pub session_id: SessionId,
    /// Title assigned by the server, if any.
    #[serde(default)]
    pub session_title: Option<String>,
    /// Whether the server created the session for this turn.
    #[serde(default)]
    pub created_new_session: bool,
    /// The stored user message.
    pub user_message: MessageDto,
    /// The assistant reply.
    pub assistant_message: MessageDto,
    /// Tool outputs, in pipeline order.
    #[serde(default)]
    pub tool_messages: Vec<MessageDto>,
    /// Files stored with this turn.
    #[serde(default)]
    pub uploads: Vec<UploadArtifactDto>,
    /// Forecast job started by the turn.
    #[serde(default)]
    pub forecast_job_id: Option<String>,
    /// Raw forecast service response.
    #[serde(default)]
    pub chronos_response: Option<Value>,
}

impl ChatTurn {
    /// Messages in commit order: user, tools, assistant.
    pub fn ordered_messages(&self) -> impl Iterator<Item = &MessageDto> {
        std::iter::once(&self.user_message)
            .chain(self.tool_messages.iter())
            .chain(std::iter::once(&self.assistant_message))
    }
}

/// Entry of the session list endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummaryDto {
    /// Session ID.
    pub id: SessionId,
    /// Title.
    #[serde(default)]
    pub title: Option<String>,
    /// Creation time.
    #[serde(with = "crate::time::required")]
    pub created_at: DateTime<Utc>,
    /// Last update time.
    #[serde(with = "crate::time::required")]
    pub updated_at: DateTime<Utc>,
    /// Time of the newest message.
    #[serde(default, with = "crate::time::optional")]
    pub last_message_at: Option<DateTime<Utc>>,
    /// Number of stored messages.
    #[serde(default)]
    pub message_count: u32,
}

impl From<SessionSummaryDto> for SessionSummary {
    fn from(dto: SessionSummaryDto) -> Self {
        let last_updated = dto
            .last_message_at
            .map_or(dto.updated_at, |at| at.max(dto.updated_at));
        Self {
            id: dto.id,
            title: dto.title,
            last_updated,
            created_at: Some(dto.created_at),
        }
    }
}

/// Full history of one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    /// Session ID.
    #[serde(alias = "id")]
    pub session_id: SessionId,
    /// Title.
    #[serde(default, alias = "title")]
    pub session_title: Option<String>,
    /// Creation time.
    #[serde(with = "crate::time::required")]
    pub created_at: DateTime<Utc>,
    /// Last update time.
    #[serde(with = "crate::time::required")]
    pub updated_at: DateTime<Utc>,
    /// Messages in sequence order.
    #[serde(default)]
    pub messages: Vec<MessageDto>,
    /// Uploads.
    #[serde(default)]
    pub uploads: Vec<UploadArtifactDto>,
}

/// Pipeline stage announced by a progress frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStep {
    /// Request accepted.
    Received,
    /// Files being stored.
    Uploading,
    /// Uploaded data being normalized.
    Structuring,
    /// Forecast inference started.
    InferenceStart,
    /// Forecast inference finished.
    InferenceComplete,
    /// Assistant reply being generated.
    Responding,
    /// A stage this client does not know about.
    #[serde(other)]
    Other,
}

impl ProgressStep {
    /// Human-readable label for progress displays.
    pub fn label(self) -> &'static str {
        match self {
            Self::Received => "Request received",
            Self::Uploading => "Uploading files",
            Self::Structuring => "Structuring data",
            Self::InferenceStart => "Running forecast",
            Self::InferenceComplete => "Forecast ready",
            Self::Responding => "Writing reply",
            Self::Other => "Working",
        }
    }
}

/// Canonical session announced before the result arrives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAssignment {
    /// Canonical session ID.
    pub session_id: SessionId,
    /// Server title, if already known.
    #[serde(default)]
    pub title: Option<String>,
    /// Whether the server created the session.
    #[serde(default)]
    pub created_new: bool,
}

/// One decoded frame of a streamed submit response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// Advisory pipeline progress.
    Progress {
        /// Current stage.
        step: ProgressStep,
    },
    /// Canonical session assignment.
    Session(SessionAssignment),
    /// Terminal payload.
    Result {
        /// Full turn.
        payload: Box<ChatTurn>,
    },
}
