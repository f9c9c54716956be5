//! reqwest-backed [`ChatApi`].

use std::time::Duration;

use async_trait::async_trait;
use chronos_core::errors::{ApiError, ProtocolError};
use chronos_core::ids::SessionId;
use chronos_core::wire::{ChatTurn, SessionDetail, SessionSummaryDto};
use chronos_settings::ApiSettings;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::api::{ChatApi, FileAttachment, SubmitObserver, SubmitRequest};
use crate::stream::drive_stream;

/// HTTP client for the chat endpoints under the configured base URL.
#[derive(Clone, Debug)]
pub struct HttpChatApi {
    client: Client,
    base_url: String,
}

impl HttpChatApi {
    /// Build a client with the configured connect timeout and no read timeout.
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self::with_client(client, &settings.base_url))
    }

    /// Use an existing client.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn session_url(&self, session_id: &SessionId) -> String {
        self.url(&format!("/chat/session/{session_id}"))
    }
}

fn build_form(request: SubmitRequest) -> Form {
    let mut form = Form::new();
    if let Some(session_id) = request.session_id {
        form = form.text("session_id", session_id.to_string());
    }
    if let Some(content) = request.content {
        form = form.text("content", content);
    }
    for file in request.files {
        form = form.part("files", file_part(file));
    }
    form
}

fn file_part(file: FileAttachment) -> Part {
    let FileAttachment {
        filename,
        mime_type,
        data,
    } = file;
    let part = Part::bytes(data.to_vec()).file_name(filename.clone());
    match mime_type {
        Some(mime) => match part.mime_str(&mime) {
            Ok(part) => part,
            Err(e) => {
                warn!(%filename, %mime, error = %e, "ignoring invalid mime type");
                Part::bytes(data.to_vec()).file_name(filename)
            }
        },
        None => part,
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with("application/json"))
}

/// Reject non-success statuses with a classified error.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(status.as_u16(), body))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ProtocolError::InvalidPayload(e.to_string()).into())
}

/// Await `fut` unless `cancel` fires first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ApiError::Cancelled),
        result = fut => result,
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    #[instrument(skip_all, fields(session_id = ?request.session_id, files = request.files.len()))]
    async fn submit(
        &self,
        request: SubmitRequest,
        observer: &dyn SubmitObserver,
        cancel: &CancellationToken,
    ) -> Result<ChatTurn, ApiError> {
        let send = self
            .client
            .post(self.url("/chat/message"))
            .header(ACCEPT, "text/event-stream, application/json")
            .multipart(build_form(request))
            .send();

        let response = cancellable(cancel, async {
            let response = send.await.map_err(|e| ApiError::Network(e.to_string()))?;
            check_status(response).await
        })
        .await?;

        if is_json(&response) {
            debug!("non-streaming submit response");
            return cancellable(cancel, read_json::<ChatTurn>(response)).await;
        }

        drive_stream(Box::pin(response.bytes_stream()), observer, cancel).await
    }

    #[instrument(skip(self))]
    async fn list_sessions(&self) -> Result<Vec<SessionSummaryDto>, ApiError> {
        let response = self
            .client
            .get(self.url("/chat/sessions"))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        read_json(check_status(response).await?).await
    }

    #[instrument(skip(self, cancel), fields(session_id = %session_id))]
    async fn session_detail(
        &self,
        session_id: &SessionId,
        cancel: &CancellationToken,
    ) -> Result<SessionDetail, ApiError> {
        let request = self.client.get(self.session_url(session_id)).send();
        cancellable(cancel, async {
            let response = request.await.map_err(|e| ApiError::Network(e.to_string()))?;
            read_json(check_status(response).await?).await
        })
        .await
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn delete_session(&self, session_id: &SessionId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.session_url(session_id))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let _ = check_status(response).await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
