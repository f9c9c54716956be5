//! # Optimistic reconciler
//!
//! Shows a submission immediately as a pending message (in a local
//! provisional session when no session is targeted), then reconciles it with
//! the server's canonical turn, or rolls it back on failure.
//!
//! Every step that touches the catalog runs inside one transaction, so a
//! concurrent reader sees either the optimistic state or the committed one.

use std::sync::Arc;

use chronos_client::FileAttachment;
use chronos_core::errors::ValidationError;
use chronos_core::ids::{MessageId, SessionId};
use chronos_core::messages::Message;
use chronos_core::session::{Session, UploadArtifact};
use chronos_core::title::{derive_title, upload_placeholder};
use chronos_core::wire::ChatTurn;
use chronos_settings::{FailurePolicy, SubmissionSettings};
use tracing::{debug, info, warn};

use crate::catalog::{SessionCatalog, attach_uploads, upsert_message};
use crate::error::{CatalogError, SubmitError};

/// Check a submission before any state is created.
///
/// Returns the trimmed text, or `None` when only files are sent.
pub fn validate(
    text: &str,
    files: &[FileAttachment],
    limits: &SubmissionSettings,
) -> Result<Option<String>, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() && files.is_empty() {
        return Err(ValidationError::EmptySubmission);
    }
    if files.len() > limits.max_attachments {
        return Err(ValidationError::TooManyAttachments {
            count: files.len(),
            limit: limits.max_attachments,
        });
    }
    if let Some(file) = files.iter().find(|f| f.size() > limits.max_attachment_bytes) {
        return Err(ValidationError::AttachmentTooLarge {
            filename: file.filename.clone(),
            size: file.size(),
            limit: limits.max_attachment_bytes,
        });
    }
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// Binds an in-flight submission to its optimistic state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionalHandle {
    /// Session holding the pending message.
    pub session_id: SessionId,
    /// The pending message.
    pub message_id: MessageId,
    /// The session is local; the server has not assigned an ID yet.
    pub provisional_session: bool,
}

impl ProvisionalHandle {
    /// Session ID to send to the server, `None` to have it create one.
    pub fn request_session_id(&self) -> Option<SessionId> {
        (!self.provisional_session).then(|| self.session_id.clone())
    }
}

/// Result of applying a server turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The turn is now part of the session.
    Committed {
        /// Canonical session ID.
        session_id: SessionId,
    },
    /// The session was deleted while the submission was in flight.
    Discarded,
}

/// Applies optimistic submissions to a [`SessionCatalog`].
#[derive(Debug)]
pub struct OptimisticReconciler {
    catalog: Arc<SessionCatalog>,
    failure_policy: FailurePolicy,
}

impl OptimisticReconciler {
    /// Create a reconciler over `catalog`.
    pub fn new(catalog: Arc<SessionCatalog>, failure_policy: FailurePolicy) -> Self {
        Self {
            catalog,
            failure_policy,
        }
    }

    /// Show a submission optimistically.
    ///
    /// With no `target`, a provisional session is created. The session is
    /// moved to the front and selected. A target that already holds a
    /// pending message is refused.
    pub fn begin_submission(
        &self,
        content: Option<&str>,
        files: &[FileAttachment],
        target: Option<&SessionId>,
    ) -> Result<ProvisionalHandle, SubmitError> {
        let text = content.map_or_else(|| upload_placeholder(files.len()), str::to_string);
        let message = Message::provisional_user(text);
        let message_id = message.id.clone();

        let handle = self.catalog.transact(|state| -> Result<ProvisionalHandle, SubmitError> {
            let (session_id, provisional_session) = match target {
                Some(id) => {
                    let session = state
                        .session_mut(id)
                        .ok_or_else(|| SubmitError::UnknownSession(id.clone()))?;
                    if session.has_pending() {
                        return Err(SubmitError::InProgress(id.clone()));
                    }
                    session.messages.push(message);
                    (id.clone(), session.provisional)
                }
                None => {
                    let mut session = Session::provisional(derive_title(content.unwrap_or_default(), files));
                    session.messages.push(message);
                    let id = session.id.clone();
                    state.insert(session);
                    (id, true)
                }
            };
            state.move_to_front(&session_id)?;
            state.select(&session_id)?;
            Ok(ProvisionalHandle {
                session_id,
                message_id,
                provisional_session,
            })
        })?;

        debug!(
            session_id = %handle.session_id,
            message_id = %handle.message_id,
            provisional = handle.provisional_session,
            "submission started"
        );
        Ok(handle)
    }

    /// Replace the optimistic state with the server's turn.
    pub fn commit(&self, handle: &ProvisionalHandle, turn: ChatTurn) -> Result<CommitOutcome, CatalogError> {
        let final_id = turn.session_id.clone();

        let outcome = self.catalog.transact(|state| -> Result<CommitOutcome, CatalogError> {
            let provisional_present = state.contains(&handle.session_id);
            if !provisional_present && !state.contains(&final_id) {
                return Ok(CommitOutcome::Discarded);
            }
            if provisional_present && handle.session_id != final_id {
                // The server's id names this same conversation, even when a
                // refresh already loaded it under that id.
                if state.contains(&final_id) {
                    state.merge_into(&handle.session_id, &final_id)?;
                } else {
                    state.replace_key(&handle.session_id, final_id.clone())?;
                }
            }

            let session = state
                .session_mut(&final_id)
                .ok_or_else(|| CatalogError::NotFound(final_id.clone()))?;
            session.messages.retain(|m| !m.is_pending());
            session.provisional = false;

            let user_content = turn.user_message.content.clone().unwrap_or_default();
            let ChatTurn {
                session_title,
                user_message,
                assistant_message,
                tool_messages,
                uploads,
                ..
            } = turn;
            upsert_message(session, user_message.into_message());
            for tool in tool_messages {
                upsert_message(session, tool.into_message());
            }
            upsert_message(session, assistant_message.into_message());

            let uploads: Vec<UploadArtifact> = uploads.into_iter().map(UploadArtifact::from).collect();
            match session_title.filter(|t| !t.trim().is_empty()) {
                Some(title) => session.title = Some(title),
                None if session.title.is_some() => {}
                None => session.title = Some(derive_title(&user_content, &uploads)),
            }
            attach_uploads(session, uploads);

            state.move_to_front(&final_id)?;
            Ok(CommitOutcome::Committed {
                session_id: final_id.clone(),
            })
        });

        match &outcome {
            Ok(CommitOutcome::Committed { session_id }) => {
                info!(session_id = %session_id, message_id = %handle.message_id, "submission committed");
            }
            Ok(CommitOutcome::Discarded) => {
                info!(session_id = %handle.session_id, "session deleted while streaming; result discarded");
            }
            Err(e) => warn!(session_id = %handle.session_id, error = %e, "commit failed"),
        }
        outcome
    }

    /// Undo a submission according to the failure policy.
    ///
    /// Under [`FailurePolicy::Remove`] the pending message is removed, and a
    /// provisional session left empty is removed with it. Under
    /// [`FailurePolicy::MarkFailed`] the message stays, marked failed with
    /// `reason`. Returns whether anything changed.
    pub fn rollback(&self, handle: &ProvisionalHandle, reason: &str) -> bool {
        let policy = self.failure_policy;
        let changed = self.catalog.transact(|state| {
            let Some(session) = state.session_mut(&handle.session_id) else {
                return false;
            };
            let Some(idx) = session
                .messages
                .iter()
                .position(|m| m.id == handle.message_id && m.is_pending())
            else {
                return false;
            };

            match policy {
                FailurePolicy::Remove => {
                    let _ = session.messages.remove(idx);
                    if session.provisional && session.messages.is_empty() {
                        let _ = state.remove(&handle.session_id);
                    }
                }
                FailurePolicy::MarkFailed => {
                    let message = session.messages.remove(idx);
                    match message.clone().into_failed(reason) {
                        Ok(failed) => session.messages.insert(idx, failed),
                        Err(_) => session.messages.insert(idx, message),
                    }
                }
            }
            true
        });

        if changed {
            debug!(
                session_id = %handle.session_id,
                message_id = %handle.message_id,
                ?policy,
                "submission rolled back"
            );
        }
        changed
    }
}
