//! Engine error types.

use chronos_core::errors::{ApiError, ValidationError};
use chronos_core::ids::SessionId;

/// Failures of catalog operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// No session with this ID.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// The new key already holds a different session.
    #[error("cannot rename {from} to {to}: target already exists")]
    KeyConflict {
        /// Key being migrated.
        from: SessionId,
        /// Key already in use.
        to: SessionId,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
/// Why a submission did not commit.
pub enum SubmitError {
    /// Rejected before any state was created.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The target session already has a pending message.
    #[error("submission already in progress for this session")]
    InProgress(SessionId),

    /// The target session is not in the catalog.
    #[error("session not found: {0}")]
    UnknownSession(SessionId),

    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The server turn could not be applied.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
/// Why a history fetch failed.
pub enum HydrateError {
    /// The session is not in the catalog.
    #[error("session not found: {0}")]
    UnknownSession(SessionId),

    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
/// Any failure surfaced by [`crate::ChatEngine`].
pub enum EngineError {
    /// From a submission.
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// From history hydration.
    #[error(transparent)]
    Hydrate(#[from] HydrateError),

    /// From the catalog.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// From a direct backend call.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SubmitError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InProgress(_) => "in_progress",
            Self::UnknownSession(_) => "unknown_session",
            Self::Api(e) => e.error_kind(),
            Self::Catalog(_) => "catalog",
        }
    }

    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::Catalog(_) => "Failed to send message. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl HydrateError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::UnknownSession(_) => "unknown_session",
            Self::Api(e) => e.error_kind(),
        }
    }
}

impl EngineError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Submit(e) => e.error_kind(),
            Self::Hydrate(e) => e.error_kind(),
            Self::Catalog(CatalogError::NotFound(_)) => "not_found",
            Self::Catalog(CatalogError::KeyConflict { .. }) => "key_conflict",
            Self::Api(e) => e.error_kind(),
        }
    }

    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Submit(e) => e.user_message(),
            Self::Hydrate(HydrateError::Api(e)) | Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    /// Whether the operation was aborted by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Api(ApiError::Cancelled)
                | Self::Submit(SubmitError::Api(ApiError::Cancelled))
                | Self::Hydrate(HydrateError::Api(ApiError::Cancelled))
        )
    }
}
