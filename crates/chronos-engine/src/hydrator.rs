//! # Session hydrator
//!
//! Loads the full history of a session on demand. At most one fetch per
//! session is in flight at a time; callers that arrive while it runs get
//! [`HydrateOutcome::InFlight`] instead of a second request.
//!
//! Each fetch owns a child of the root cancellation token passed at
//! construction, so a single session can be cancelled (on delete) or all of
//! them at once.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chronos_client::ChatApi;
use chronos_core::errors::ApiError;
use chronos_core::ids::{MessageId, SessionId, UploadId};
use chronos_core::messages::{Message, MessageState};
use chronos_core::session::UploadArtifact;
use chronos_core::wire::SessionDetail;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::catalog::{CatalogState, SessionCatalog, attach_uploads};
use crate::error::HydrateError;

/// What a call to [`SessionHydrator::hydrate`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HydrateOutcome {
    /// History fetched and installed.
    Hydrated,
    /// Nothing to do; history already loaded.
    AlreadyHydrated,
    /// Another call is fetching this session.
    InFlight,
    /// Local provisional session; the server has no history for it.
    Skipped,
    /// The fetch was cancelled; the session stays unhydrated.
    Cancelled,
    /// The session was removed before the fetch completed.
    Discarded,
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

/// Releases the in-flight slot on every exit path, unless it was already
/// taken over by a newer fetch.
struct InFlightGuard<'a> {
    map: &'a DashMap<SessionId, InFlight>,
    id: SessionId,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let _ = self
            .map
            .remove_if(&self.id, |_, entry| entry.generation == self.generation);
    }
}

/// Fetches session history into the catalog.
pub struct SessionHydrator {
    api: Arc<dyn ChatApi>,
    catalog: Arc<SessionCatalog>,
    in_flight: DashMap<SessionId, InFlight>,
    generation: AtomicU64,
    root: CancellationToken,
}

impl SessionHydrator {
    /// Create a hydrator whose fetches are children of `root`.
    pub fn new(api: Arc<dyn ChatApi>, catalog: Arc<SessionCatalog>, root: CancellationToken) -> Self {
        Self {
            api,
            catalog,
            in_flight: DashMap::new(),
            generation: AtomicU64::new(0),
            root,
        }
    }

    /// Load a session's history unless it is loaded or already loading.
    ///
    /// Failures leave the session unhydrated so the call can be retried.
    #[instrument(skip_all, fields(session_id = %id))]
    pub async fn hydrate(&self, id: &SessionId) -> Result<HydrateOutcome, HydrateError> {
        let flags = self
            .catalog
            .inspect(|state| state.session(id).map(|s| (s.provisional, s.hydrated)));
        match flags {
            None => return Err(HydrateError::UnknownSession(id.clone())),
            Some((true, _)) => return Ok(HydrateOutcome::Skipped),
            Some((_, true)) => return Ok(HydrateOutcome::AlreadyHydrated),
            Some(_) => {}
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cancel = match self.in_flight.entry(id.clone()) {
            Entry::Occupied(_) => {
                debug!("hydration already in flight");
                return Ok(HydrateOutcome::InFlight);
            }
            Entry::Vacant(slot) => {
                let cancel = self.root.child_token();
                let _ = slot.insert(InFlight {
                    generation,
                    cancel: cancel.clone(),
                });
                cancel
            }
        };
        let _guard = InFlightGuard {
            map: &self.in_flight,
            id: id.clone(),
            generation,
        };

        let detail = match self.api.session_detail(id, &cancel).await {
            Ok(detail) => detail,
            Err(ApiError::Cancelled) => return Ok(HydrateOutcome::Cancelled),
            Err(e) => {
                warn!(error = %e, error_kind = e.error_kind(), "hydration failed");
                return Err(e.into());
            }
        };
        if cancel.is_cancelled() {
            return Ok(HydrateOutcome::Cancelled);
        }

        let installed = self.catalog.transact(|state| install_history(state, id, detail));
        if installed {
            debug!("session hydrated");
            Ok(HydrateOutcome::Hydrated)
        } else {
            debug!("session removed during hydration");
            Ok(HydrateOutcome::Discarded)
        }
    }

    /// Cancel an in-flight fetch for `id`. Returns whether one was running.
    pub fn cancel(&self, id: &SessionId) -> bool {
        match self.in_flight.remove(id) {
            Some((_, entry)) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight fetch.
    pub fn cancel_all(&self) {
        self.in_flight.retain(|_, entry| {
            entry.cancel.cancel();
            false
        });
    }

    /// Whether a fetch for `id` is running.
    pub fn is_in_flight(&self, id: &SessionId) -> bool {
        self.in_flight.contains_key(id)
    }
}

/// Replace a session's server history.
///
/// Local messages that are not committed yet are kept after the history, and
/// so are committed messages the snapshot does not contain: a turn that
/// committed while the fetch was outstanding is newer than the snapshot.
/// Returns `false` if the session no longer exists.
fn install_history(state: &mut CatalogState, id: &SessionId, detail: SessionDetail) -> bool {
    let Some(session) = state.session_mut(id) else {
        return false;
    };

    let fetched: HashSet<&MessageId> = detail.messages.iter().map(|m| &m.id).collect();
    let (committed, local): (Vec<Message>, Vec<Message>) = session
        .messages
        .drain(..)
        .partition(|m| m.state == MessageState::Committed);
    let newer: Vec<Message> = committed.into_iter().filter(|m| !fetched.contains(&m.id)).collect();
    let kept_latest = newer.iter().chain(&local).map(|m| m.created_at).max();

    let fetched_uploads: HashSet<&UploadId> = detail.uploads.iter().map(|u| &u.id).collect();
    let newer_uploads: Vec<UploadArtifact> = std::mem::take(&mut session.uploads)
        .into_iter()
        .filter(|u| !fetched_uploads.contains(&u.id))
        .collect();

    let mut history = detail.messages;
    history.sort_by_key(|m| m.sequence_index);
    session.messages = history.into_iter().map(|m| m.into_message()).collect();
    let history_latest = session.messages.iter().map(|m| m.created_at).max();
    if !newer.is_empty() {
        debug!(count = newer.len(), "keeping messages committed during hydration");
    }
    session.messages.extend(newer);
    session.messages.extend(local);

    attach_uploads(session, detail.uploads.into_iter().map(UploadArtifact::from));
    attach_uploads(session, newer_uploads);

    if detail.session_title.is_some() {
        session.title = detail.session_title;
    }
    session.created_at = detail.created_at;
    let mut last_updated = history_latest.map_or(detail.updated_at, |t| t.max(detail.updated_at));
    if let Some(kept_latest) = kept_latest {
        last_updated = last_updated.max(kept_latest).max(session.last_updated);
    }
    session.last_updated = last_updated;
    session.hydrated = true;

    state.place(id);
    true
}
