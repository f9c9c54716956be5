//! Conversation messages and their lifecycle state.
//!
//! A message created optimistically on the client starts out
//! [`MessageState::Pending`]. It is never flipped to committed in place:
//! the canonical batch from the server replaces it. The only transitions a
//! pending message may take are the explicit ones on [`MessageState`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ids::MessageId;
use crate::session::UploadArtifact;

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person using the client.
    User,
    /// The model's reply.
    Assistant,
    /// Output of a backend tool (forecast runs, structured data).
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// Synchronization state of a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MessageState {
    /// Created locally, awaiting the server's canonical copy.
    Pending,
    /// Confirmed by the server.
    Committed,
    /// The submission that created it failed.
    Failed {
        /// User-facing failure description.
        reason: String,
    },
}

/// Rejected state transition.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("illegal message state transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// State the message was in.
    pub from: &'static str,
    /// State that was requested.
    pub to: &'static str,
}

impl MessageState {
    /// Short name used in logs and transition errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether the message is still awaiting confirmation.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// `Pending -> Committed`.
    pub fn mark_committed(self) -> Result<Self, InvalidTransition> {
        match self {
            Self::Pending => Ok(Self::Committed),
            other => Err(InvalidTransition {
                from: other.name(),
                to: "committed",
            }),
        }
    }

    /// `Pending -> Failed`.
    pub fn mark_failed(self, reason: impl Into<String>) -> Result<Self, InvalidTransition> {
        match self {
            Self::Pending => Ok(Self::Failed {
                reason: reason.into(),
            }),
            other => Err(InvalidTransition {
                from: other.name(),
                to: "failed",
            }),
        }
    }
}

/// A single message in a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within the owning session.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Plain text body, if any.
    pub content: Option<String>,
    /// Structured payload attached by the backend (tool output).
    pub raw_payload: Option<Value>,
    /// Backend ordering key; `None` for provisional messages.
    pub sequence_index: Option<i64>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Synchronization state.
    pub state: MessageState,
    /// Uploads whose message reference points at this message, in order.
    pub uploads: Vec<UploadArtifact>,
}

impl Message {
    /// Build the optimistic user message shown while a submission streams.
    pub fn provisional_user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::local(),
            role: Role::User,
            content: Some(content.into()),
            raw_payload: None,
            sequence_index: None,
            created_at: Utc::now(),
            state: MessageState::Pending,
            uploads: Vec::new(),
        }
    }

    /// Whether the message is still awaiting confirmation.
    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// Consume a pending message and return it in the failed state.
    pub fn into_failed(self, reason: impl Into<String>) -> Result<Self, InvalidTransition> {
        let state = self.state.mark_failed(reason)?;
        Ok(Self { state, ..self })
    }
}
