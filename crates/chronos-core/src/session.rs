//! Sessions, their summaries, and uploaded file artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{MessageId, SessionId, UploadId};
use crate::messages::Message;

/// Progress of the backend's content extraction for an upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    /// Stored, not yet processed.
    #[default]
    Pending,
    /// Extraction running.
    Processing,
    /// Extraction finished.
    Complete,
    /// Extraction failed.
    Failed,
}

/// Metadata for a file uploaded into a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadArtifact {
    /// Server-assigned ID.
    pub id: UploadId,
    /// Owning session.
    pub session_id: SessionId,
    /// Message the upload was submitted with, if any.
    pub message_id: Option<MessageId>,
    /// Filename as supplied by the user.
    pub filename: String,
    /// Storage path relative to the backend's upload root.
    pub stored_path: String,
    /// MIME type reported at upload time.
    pub mime_type: Option<String>,
    /// Size on disk.
    pub size_bytes: Option<u64>,
    /// Extraction progress.
    pub extraction_status: ExtractionStatus,
    /// Structured extraction output.
    pub extraction_result: Option<Value>,
    /// Upload time.
    pub created_at: DateTime<Utc>,
}

/// Lightweight projection of a session used for catalog ordering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session ID.
    pub id: SessionId,
    /// Display title.
    pub title: Option<String>,
    /// Last modification time; drives recency ordering.
    pub last_updated: DateTime<Utc>,
    /// Creation time, when the source reports it.
    pub created_at: Option<DateTime<Utc>>,
}

/// A conversation thread as held by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (server-assigned, or local while provisional).
    pub id: SessionId,
    /// Display title.
    pub title: Option<String>,
    /// Messages in conversation order.
    pub messages: Vec<Message>,
    /// Every upload in the session, including session-level ones.
    pub uploads: Vec<UploadArtifact>,
    /// Last modification time.
    pub last_updated: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Whether the full history has been fetched or committed.
    pub hydrated: bool,
    /// Created locally and not yet confirmed by the server.
    pub provisional: bool,
}

impl Session {
    /// A session known only from a summary; history not loaded yet.
    pub fn from_summary(summary: SessionSummary) -> Self {
        Self {
            created_at: summary.created_at.unwrap_or(summary.last_updated),
            id: summary.id,
            title: summary.title,
            messages: Vec::new(),
            uploads: Vec::new(),
            last_updated: summary.last_updated,
            hydrated: false,
            provisional: false,
        }
    }

    /// A locally created session for a first submission.
    pub fn provisional(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::local(),
            title: Some(title.into()),
            messages: Vec::new(),
            uploads: Vec::new(),
            last_updated: now,
            created_at: now,
            hydrated: true,
            provisional: true,
        }
    }

    /// Project to a summary.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            last_updated: self.last_updated,
            created_at: Some(self.created_at),
        }
    }

    /// The in-flight message, if one exists.
    pub fn pending_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_pending())
    }

    /// Whether a submission is in flight for this session.
    pub fn has_pending(&self) -> bool {
        self.pending_message().is_some()
    }

    /// Messages confirmed by the server, in order.
    pub fn committed_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|m| m.state == crate::messages::MessageState::Committed)
    }

    /// Look up a message by ID.
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Message, MessageState};

    fn summary(id: &str) -> SessionSummary {
        SessionSummary {
            id: SessionId::from_raw(id),
            title: Some("Sales forecast".into()),
            last_updated: Utc::now(),
            created_at: None,
        }
    }

    #[test]
    fn from_summary_is_unhydrated() {
        let s = Session::from_summary(summary("s1"));
        assert!(!s.hydrated);
        assert!(!s.provisional);
        assert_eq!(s.created_at, s.last_updated);
    }

    #[test]
    fn provisional_session_is_local_and_hydrated() {
        let s = Session::provisional("New conversation");
        assert!(s.id.is_local());
        assert!(s.provisional);
        assert!(s.hydrated);
    }

    #[test]
    fn pending_lookup() {
        let mut s = Session::from_summary(summary("s1"));
        assert!(!s.has_pending());
        s.messages.push(Message::provisional_user("hi"));
        assert!(s.has_pending());
        assert_eq!(s.committed_messages().count(), 0);
    }

    #[test]
    fn committed_filter_skips_failed() {
        let mut s = Session::from_summary(summary("s1"));
        let failed = Message::provisional_user("hi").into_failed("x").unwrap();
        s.messages.push(failed);
        let mut ok = Message::provisional_user("ok");
        ok.state = MessageState::Committed;
        s.messages.push(ok);
        assert_eq!(s.committed_messages().count(), 1);
    }
}
