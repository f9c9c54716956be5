//! The `ChatApi` seam between the engine and the backend.

use async_trait::async_trait;
use bytes::Bytes;
use chronos_core::errors::ApiError;
use chronos_core::ids::SessionId;
use chronos_core::wire::{ChatTurn, ProgressStep, SessionAssignment, SessionDetail, SessionSummaryDto};
use tokio_util::sync::CancellationToken;

/// A file to upload with a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileAttachment {
    /// Name sent as the multipart filename.
    pub filename: String,
    /// MIME type, if known.
    pub mime_type: Option<String>,
    /// File contents.
    pub data: Bytes,
}

impl FileAttachment {
    /// Build an attachment from in-memory bytes.
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: None,
            data: data.into(),
        }
    }

    /// Set the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Read an attachment from disk, guessing the MIME type from the extension.
    pub async fn from_path(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string());
        Ok(Self {
            filename,
            mime_type,
            data: Bytes::from(data),
        })
    }
}

/// Body of a submit call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmitRequest {
    /// Target session; `None` asks the server to create one.
    pub session_id: Option<SessionId>,
    /// Trimmed message text.
    pub content: Option<String>,
    /// Files to upload.
    pub files: Vec<FileAttachment>,
}

/// Receives advisory events while a submission streams.
///
/// Both callbacks run on the task driving the stream and must not block.
pub trait SubmitObserver: Send + Sync {
    /// A progress frame arrived. Each call supersedes the previous one.
    fn on_progress(&self, _step: ProgressStep) {}

    /// The server announced the canonical session.
    fn on_session_assigned(&self, _assignment: &SessionAssignment) {}
}

impl SubmitObserver for () {}

/// Backend operations used by the engine.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a message and wait for its terminal payload.
    async fn submit(
        &self,
        request: SubmitRequest,
        observer: &dyn SubmitObserver,
        cancel: &CancellationToken,
    ) -> Result<ChatTurn, ApiError>;

    /// List sessions known to the server.
    async fn list_sessions(&self) -> Result<Vec<SessionSummaryDto>, ApiError>;

    /// Fetch the full history of one session.
    async fn session_detail(
        &self,
        session_id: &SessionId,
        cancel: &CancellationToken,
    ) -> Result<SessionDetail, ApiError>;

    /// Delete a session.
    async fn delete_session(&self, session_id: &SessionId) -> Result<(), ApiError>;
}
