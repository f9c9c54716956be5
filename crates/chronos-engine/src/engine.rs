//! # Chat engine
//!
//! Facade that wires the catalog, reconciler and hydrator to a [`ChatApi`].
//! Front ends talk only to [`ChatEngine`].

use std::sync::Arc;

use chronos_client::{ChatApi, FileAttachment, SubmitObserver, SubmitRequest};
use chronos_core::errors::ApiError;
use chronos_core::ids::SessionId;
use chronos_core::session::SessionSummary;
use chronos_settings::SubmissionSettings;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::catalog::SessionCatalog;
use crate::error::{EngineError, SubmitError};
use crate::hydrator::{HydrateOutcome, SessionHydrator};
use crate::reconciler::{CommitOutcome, OptimisticReconciler, ProvisionalHandle, validate};

/// A message to send.
#[derive(Clone, Debug, Default)]
pub struct SubmitInput {
    /// Existing session to continue; `None` starts a new conversation.
    pub session_id: Option<SessionId>,
    /// Message text, trimmed before sending.
    pub text: String,
    /// Files to upload.
    pub files: Vec<FileAttachment>,
}

/// How a submission ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The turn was committed to the session.
    Committed {
        /// Canonical session ID.
        session_id: SessionId,
    },
    /// The session was deleted while the submission streamed.
    Discarded,
    /// Cancelled by the caller. The optimistic state is untouched; pass the
    /// handle to [`ChatEngine::rollback`] to remove it.
    Cancelled(ProvisionalHandle),
}

/// Client-side chat state and the operations that change it.
pub struct ChatEngine {
    api: Arc<dyn ChatApi>,
    catalog: Arc<SessionCatalog>,
    reconciler: OptimisticReconciler,
    hydrator: SessionHydrator,
    limits: SubmissionSettings,
    shutdown: CancellationToken,
}

impl ChatEngine {
    /// Create an engine over `api` with an empty catalog.
    pub fn new(api: Arc<dyn ChatApi>, limits: SubmissionSettings) -> Self {
        let catalog = Arc::new(SessionCatalog::new());
        let shutdown = CancellationToken::new();
        Self {
            reconciler: OptimisticReconciler::new(Arc::clone(&catalog), limits.failure_policy),
            hydrator: SessionHydrator::new(Arc::clone(&api), Arc::clone(&catalog), shutdown.clone()),
            api,
            catalog,
            limits,
            shutdown,
        }
    }

    /// Read access for rendering.
    pub fn catalog(&self) -> &SessionCatalog {
        &self.catalog
    }

    /// The hydrator, for callers that load history without selecting.
    pub fn hydrator(&self) -> &SessionHydrator {
        &self.hydrator
    }

    /// Fetch the session list and merge it into the catalog.
    ///
    /// Returns the number of sessions in the catalog afterwards.
    #[instrument(skip(self))]
    pub async fn refresh_sessions(&self) -> Result<usize, EngineError> {
        let summaries = self.api.list_sessions().await?;
        let dropped = self
            .catalog
            .sync_summaries(summaries.into_iter().map(SessionSummary::from).collect());
        if !dropped.is_empty() {
            info!(count = dropped.len(), "sessions removed server-side");
        }
        Ok(self.catalog.len())
    }

    /// Select a session and load its history.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn select(&self, id: &SessionId) -> Result<HydrateOutcome, EngineError> {
        self.catalog.select(id)?;
        Ok(self.hydrator.hydrate(id).await?)
    }

    /// Send a message.
    ///
    /// Validation failures create no state and make no request. Network and
    /// protocol failures roll the optimistic state back according to the
    /// configured failure policy. Cancellation leaves it in place.
    #[instrument(skip_all, fields(session_id = ?input.session_id, files = input.files.len()))]
    pub async fn submit(
        &self,
        input: SubmitInput,
        observer: &dyn SubmitObserver,
        cancel: &CancellationToken,
    ) -> Result<SubmitOutcome, SubmitError> {
        let content = validate(&input.text, &input.files, &self.limits)?;
        let handle =
            self.reconciler
                .begin_submission(content.as_deref(), &input.files, input.session_id.as_ref())?;

        let request = SubmitRequest {
            session_id: handle.request_session_id(),
            content,
            files: input.files,
        };

        match self.api.submit(request, observer, cancel).await {
            Ok(turn) => match self.reconciler.commit(&handle, turn) {
                Ok(CommitOutcome::Committed { session_id }) => Ok(SubmitOutcome::Committed { session_id }),
                Ok(CommitOutcome::Discarded) => Ok(SubmitOutcome::Discarded),
                Err(e) => {
                    let _ = self.reconciler.rollback(&handle, &e.to_string());
                    Err(e.into())
                }
            },
            Err(ApiError::Cancelled) => {
                info!(session_id = %handle.session_id, "submission cancelled");
                Ok(SubmitOutcome::Cancelled(handle))
            }
            Err(e) => {
                warn!(
                    session_id = %handle.session_id,
                    error = %e,
                    error_kind = e.error_kind(),
                    "submission failed"
                );
                let _ = self.reconciler.rollback(&handle, &e.user_message());
                Err(e.into())
            }
        }
    }

    /// Roll back a cancelled submission.
    pub fn rollback(&self, handle: &ProvisionalHandle) -> bool {
        self.reconciler.rollback(handle, "cancelled")
    }

    /// Delete a session locally and on the server.
    ///
    /// A session the server no longer knows counts as deleted. Provisional
    /// sessions never reached the server and are only removed locally.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn delete(&self, id: &SessionId) -> Result<(), EngineError> {
        let _ = self.hydrator.cancel(id);
        let provisional = self
            .catalog
            .inspect(|state| state.session(id).map(|s| s.provisional))
            .unwrap_or_else(|| id.is_local());

        if !provisional {
            match self.api.delete_session(id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => info!("session already deleted server-side"),
                Err(e) => {
                    warn!(error = %e, error_kind = e.error_kind(), "delete failed");
                    return Err(e.into());
                }
            }
        }

        let _ = self.catalog.remove(id);
        Ok(())
    }

    /// Cancel every background fetch owned by the engine.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for ChatEngine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
