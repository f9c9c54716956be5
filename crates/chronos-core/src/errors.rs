//! Error taxonomy shared by the client and the engine.
//!
//! - [`ValidationError`]: rejected before any network call
//! - [`ProtocolError`]: the server answered but the stream or body was unusable
//! - [`ApiError`]: any failure of an HTTP operation, including the two above
//!   when they surface through a request

use thiserror::Error;

/// Submission rejected locally; no request is sent and no state is created.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Neither text nor attachments.
    #[error("provide a message or at least one file")]
    EmptySubmission,

    /// More attachments than allowed.
    #[error("too many attachments: {count} (limit {limit})")]
    TooManyAttachments {
        /// Attachments supplied.
        count: usize,
        /// Configured limit.
        limit: usize,
    },

    /// One attachment exceeds the size limit.
    #[error("{filename} is {size} bytes (limit {limit})")]
    AttachmentTooLarge {
        /// Offending file.
        filename: String,
        /// Its size.
        size: u64,
        /// Configured limit.
        limit: u64,
    },
}

/// The response could not be interpreted.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The stream ended before a `result` frame.
    #[error("stream ended without a result frame")]
    StreamIncomplete,

    /// A payload that must be JSON of a known shape was not.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Failure of a chat API operation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Transport failure: connect, DNS, reset, read error.
    #[error("network error: {0}")]
    Network(String),

    /// The referenced resource does not exist server-side.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server rejected the request (4xx other than 404).
    #[error("request rejected ({status}): {body}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The server failed (5xx).
    #[error("server error {status}: {body}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Unusable response.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Aborted by the caller.
    #[error("cancelled")]
    Cancelled,
}

impl ApiError {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            404 => Self::NotFound(body),
            500..=599 => Self::Server { status, body },
            _ => Self::Rejected { status, body },
        }
    }

    /// Whether the error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the caller aborted the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::NotFound(_) => "not_found",
            Self::Rejected { .. } => "rejected",
            Self::Server { .. } => "server",
            Self::Protocol(ProtocolError::StreamIncomplete) => "stream_incomplete",
            Self::Protocol(ProtocolError::InvalidPayload(_)) => "invalid_payload",
            Self::Cancelled => "cancelled",
        }
    }

    /// Message suitable for showing to the end user.
    ///
    /// Network failures are reported verbatim; protocol failures collapse
    /// into a generic submission failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(detail) => format!("Network error: {detail}"),
            Self::NotFound(_) => "The conversation no longer exists.".to_string(),
            Self::Rejected { body, .. } if !body.is_empty() => body.clone(),
            Self::Rejected { status, .. } => format!("Request rejected ({status})."),
            Self::Server { status, .. } => format!("The server failed to respond ({status})."),
            Self::Protocol(_) => "Failed to send message. Please try again.".to_string(),
            Self::Cancelled => String::new(),
        }
    }
}
