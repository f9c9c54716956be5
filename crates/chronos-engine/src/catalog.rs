//! # Session catalog
//!
//! The single owned store of client-side sessions, their recency ordering
//! and the current selection.
//!
//! All state lives in one [`CatalogState`] behind a `parking_lot::RwLock`.
//! Public operations take the lock once, so readers never observe a
//! half-applied change. The reconciler and the hydrator compose several
//! steps into one critical section through [`SessionCatalog::transact`].
//!
//! Invariants held after every operation:
//! - `order` lists exactly the keys of `sessions`, each once
//! - `order` is sorted by `last_updated`, newest first
//! - `selected`, when set, names a session in the catalog

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use chronos_core::ids::SessionId;
use chronos_core::messages::Message;
use chronos_core::session::{Session, SessionSummary, UploadArtifact};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::CatalogError;

/// Client-side session store.
#[derive(Debug, Default)]
pub struct SessionCatalog {
    state: RwLock<CatalogState>,
}

/// Lock-protected contents of the catalog.
#[derive(Debug, Default)]
pub(crate) struct CatalogState {
    sessions: HashMap<SessionId, Session>,
    order: Vec<SessionId>,
    selected: Option<SessionId>,
}

impl SessionCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the whole catalog.
    pub(crate) fn transact<R>(&self, f: impl FnOnce(&mut CatalogState) -> R) -> R {
        let mut state = self.state.write();
        f(&mut state)
    }

    /// Run `f` with shared access to the whole catalog.
    pub(crate) fn inspect<R>(&self, f: impl FnOnce(&CatalogState) -> R) -> R {
        let state = self.state.read();
        f(&state)
    }

    /// Insert or refresh a session from a server summary.
    ///
    /// Loaded history is kept; only title and timestamps are refreshed.
    pub fn upsert(&self, summary: SessionSummary) {
        self.state.write().upsert(summary);
    }

    /// Add a fully formed session, replacing any with the same ID.
    pub fn insert(&self, session: Session) {
        self.state.write().insert(session);
    }

    /// Snapshot of one session.
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.state.read().sessions.get(id).cloned()
    }

    /// Whether a session is present.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.state.read().sessions.contains_key(id)
    }

    /// Snapshot of every session, most recently updated first.
    pub fn get_all_ordered(&self) -> Vec<Session> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.sessions.get(id).cloned())
            .collect()
    }

    /// Summaries in display order, without cloning message history.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.sessions.get(id).map(Session::summary))
            .collect()
    }

    /// Session IDs in display order.
    pub fn ordered_ids(&self) -> Vec<SessionId> {
        self.state.read().order.clone()
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.state.read().sessions.len()
    }

    /// Whether the catalog holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.state.read().sessions.is_empty()
    }

    /// Remove a session. If it was selected, selection moves to the
    /// most recent remaining session.
    pub fn remove(&self, id: &SessionId) -> Option<Session> {
        self.state.write().remove(id)
    }

    /// Move every piece of state under `old` to `new`.
    pub fn replace_key(&self, old: &SessionId, new: SessionId) -> Result<(), CatalogError> {
        self.state.write().replace_key(old, new)
    }

    /// Mark a session as the most recently updated.
    pub fn move_to_front(&self, id: &SessionId) -> Result<(), CatalogError> {
        self.state.write().move_to_front(id)
    }

    /// The selected session ID.
    pub fn selected(&self) -> Option<SessionId> {
        self.state.read().selected.clone()
    }

    /// Select a session.
    pub fn select(&self, id: &SessionId) -> Result<(), CatalogError> {
        self.state.write().select(id)
    }

    /// Clear the selection.
    pub fn clear_selection(&self) {
        self.state.write().selected = None;
    }

    /// Apply a full list fetch. Returns the IDs that were dropped.
    pub fn sync_summaries(&self, summaries: Vec<SessionSummary>) -> Vec<SessionId> {
        self.state.write().sync_summaries(summaries)
    }
}

impl CatalogState {
    pub(crate) fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub(crate) fn session_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    pub(crate) fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub(crate) fn upsert(&mut self, summary: SessionSummary) {
        let id = summary.id.clone();
        match self.sessions.get_mut(&id) {
            Some(existing) => {
                if summary.title.is_some() {
                    existing.title = summary.title;
                }
                if let Some(created_at) = summary.created_at {
                    existing.created_at = created_at;
                }
                existing.last_updated = existing.last_updated.max(summary.last_updated);
            }
            None => {
                let _ = self.sessions.insert(id.clone(), Session::from_summary(summary));
            }
        }
        self.place(&id);
    }

    pub(crate) fn insert(&mut self, session: Session) {
        let id = session.id.clone();
        let _ = self.sessions.insert(id.clone(), session);
        self.place(&id);
    }

    pub(crate) fn remove(&mut self, id: &SessionId) -> Option<Session> {
        let removed = self.sessions.remove(id)?;
        self.order.retain(|o| o != id);
        if self.selected.as_ref() == Some(id) {
            self.selected = self.order.first().cloned();
        }
        debug!(session_id = %id, "session removed from catalog");
        Some(removed)
    }

    pub(crate) fn select(&mut self, id: &SessionId) -> Result<(), CatalogError> {
        if !self.sessions.contains_key(id) {
            return Err(CatalogError::NotFound(id.clone()));
        }
        self.selected = Some(id.clone());
        Ok(())
    }

    pub(crate) fn move_to_front(&mut self, id: &SessionId) -> Result<(), CatalogError> {
        let front_time = self
            .order
            .first()
            .filter(|front| *front != id)
            .and_then(|front| self.sessions.get(front))
            .map(|s| s.last_updated);
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        let now = Utc::now();
        session.last_updated = front_time.map_or(now, |t| t.max(now)).max(session.last_updated);
        self.order.retain(|o| o != id);
        self.order.insert(0, id.clone());
        Ok(())
    }

    /// Rename `old` to `new`, keeping its position, history and selection.
    ///
    /// An existing `new` is absorbed only when it is a bare summary: not
    /// hydrated and without messages. Its title and creation time fill in
    /// whatever the migrated session lacks.
    pub(crate) fn replace_key(&mut self, old: &SessionId, new: SessionId) -> Result<(), CatalogError> {
        if *old == new {
            return Ok(());
        }
        if !self.sessions.contains_key(old) {
            return Err(CatalogError::NotFound(old.clone()));
        }

        let loaded = self
            .sessions
            .get(&new)
            .map(|existing| existing.hydrated || !existing.messages.is_empty());
        let absorbed = match loaded {
            Some(true) => {
                return Err(CatalogError::KeyConflict {
                    from: old.clone(),
                    to: new,
                });
            }
            Some(false) => {
                self.order.retain(|o| *o != new);
                self.sessions.remove(&new)
            }
            None => None,
        };

        let Some(mut session) = self.sessions.remove(old) else {
            return Err(CatalogError::NotFound(old.clone()));
        };
        session.id = new.clone();
        session.provisional = false;
        for upload in &mut session.uploads {
            upload.session_id = new.clone();
        }
        for message in &mut session.messages {
            for upload in &mut message.uploads {
                upload.session_id = new.clone();
            }
        }
        if let Some(bare) = absorbed {
            if session.title.is_none() {
                session.title = bare.title;
            }
            session.created_at = session.created_at.min(bare.created_at);
            session.last_updated = session.last_updated.max(bare.last_updated);
        }

        if let Some(slot) = self.order.iter_mut().find(|o| *o == old) {
            *slot = new.clone();
        }
        if self.selected.as_ref() == Some(old) {
            self.selected = Some(new.clone());
        }
        debug!(from = %old, to = %new, "session key replaced");
        let _ = self.sessions.insert(new, session);
        Ok(())
    }

    /// Fold `old` into the existing session `new`, known to be the same
    /// conversation. `new` keeps its history; messages and uploads from `old`
    /// that it lacks are appended in order. Selection follows the merge.
    pub(crate) fn merge_into(&mut self, old: &SessionId, new: &SessionId) -> Result<(), CatalogError> {
        if old == new {
            return Ok(());
        }
        if !self.sessions.contains_key(new) {
            return Err(CatalogError::NotFound(new.clone()));
        }
        let Some(source) = self.sessions.remove(old) else {
            return Err(CatalogError::NotFound(old.clone()));
        };
        self.order.retain(|o| o != old);
        if self.selected.as_ref() == Some(old) {
            self.selected = Some(new.clone());
        }

        if let Some(target) = self.sessions.get_mut(new) {
            for mut message in source.messages {
                for upload in &mut message.uploads {
                    upload.session_id = new.clone();
                }
                upsert_message(target, message);
            }
            let uploads = source.uploads.into_iter().map(|mut upload| {
                upload.session_id = new.clone();
                upload
            });
            attach_uploads(target, uploads);
            if target.title.is_none() {
                target.title = source.title;
            }
            target.created_at = target.created_at.min(source.created_at);
            target.last_updated = target.last_updated.max(source.last_updated);
        }
        debug!(from = %old, to = %new, "session merged into existing key");
        self.place(new);
        Ok(())
    }

    pub(crate) fn sync_summaries(&mut self, summaries: Vec<SessionSummary>) -> Vec<SessionId> {
        let reported: HashSet<SessionId> = summaries.iter().map(|s| s.id.clone()).collect();
        for summary in summaries {
            self.upsert(summary);
        }
        let stale: Vec<SessionId> = self
            .order
            .iter()
            .filter(|id| !reported.contains(*id))
            .filter(|id| {
                self.sessions
                    .get(*id)
                    .is_some_and(|s| !s.provisional && !s.has_pending())
            })
            .cloned()
            .collect();
        for id in &stale {
            let _ = self.remove(id);
        }
        stale
    }

    /// Reposition `id` by its `last_updated`, after any equally recent entries.
    pub(crate) fn place(&mut self, id: &SessionId) {
        self.order.retain(|o| o != id);
        let Some(ts) = self.sessions.get(id).map(|s| s.last_updated) else {
            return;
        };
        let idx = self
            .order
            .iter()
            .position(|other| self.sessions.get(other).is_some_and(|s| s.last_updated < ts))
            .unwrap_or(self.order.len());
        self.order.insert(idx, id.clone());
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let ordered: HashSet<&SessionId> = self.order.iter().collect();
        let keys: HashSet<&SessionId> = self.sessions.keys().collect();
        assert_eq!(ordered.len(), self.order.len(), "duplicate ids in order");
        assert_eq!(ordered, keys, "order and sessions disagree");
        if let Some(selected) = &self.selected {
            assert!(self.sessions.contains_key(selected), "selection dangles");
        }
    }
}

/// Insert `message`, replacing an existing message with the same ID.
pub(crate) fn upsert_message(session: &mut Session, message: Message) {
    match session.messages.iter_mut().find(|m| m.id == message.id) {
        Some(slot) => *slot = message,
        None => session.messages.push(message),
    }
}

/// Record uploads on the session and on the messages they reference.
///
/// Uploads whose message reference matches no message stay session-level.
pub(crate) fn attach_uploads(session: &mut Session, uploads: impl IntoIterator<Item = UploadArtifact>) {
    for upload in uploads {
        if let Some(message_id) = &upload.message_id {
            if let Some(message) = session.messages.iter_mut().find(|m| &m.id == message_id) {
                match message.uploads.iter_mut().find(|u| u.id == upload.id) {
                    Some(slot) => *slot = upload.clone(),
                    None => message.uploads.push(upload.clone()),
                }
            }
        }
        match session.uploads.iter_mut().find(|u| u.id == upload.id) {
            Some(slot) => *slot = upload,
            None => session.uploads.push(upload),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{DateTime, Duration, TimeZone};
    use proptest::prelude::*;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn summary(id: &str, minutes: i64) -> SessionSummary {
        SessionSummary {
            id: SessionId::from(id),
            title: Some(format!("title {id}")),
            last_updated: at(minutes),
            created_at: Some(at(0)),
        }
    }

    fn ids(catalog: &SessionCatalog) -> Vec<String> {
        catalog.ordered_ids().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn upsert_orders_by_recency() {
        let catalog = SessionCatalog::new();
        catalog.upsert(summary("a", 10));
        catalog.upsert(summary("b", 30));
        catalog.upsert(summary("c", 20));
        assert_eq!(ids(&catalog), ["b", "c", "a"]);
        catalog.upsert(summary("a", 40));
        assert_eq!(ids(&catalog), ["a", "b", "c"]);
    }

    #[test]
    fn upsert_keeps_loaded_history() {
        let catalog = SessionCatalog::new();
        catalog.upsert(summary("a", 10));
        catalog.transact(|state| {
            let session = state.session_mut(&SessionId::from("a")).unwrap();
            session.messages.push(Message::provisional_user("hi"));
            session.hydrated = true;
        });
        catalog.upsert(SessionSummary { title: None, ..summary("a", 5) });

        let session = catalog.get(&SessionId::from("a")).unwrap();
        assert_eq!(session.messages.len(), 1);
        assert!(session.hydrated);
        assert_eq!(session.title.as_deref(), Some("title a"));
        assert_eq!(session.last_updated, at(10));
    }

    #[test]
    fn move_to_front_beats_future_timestamps() {
        let catalog = SessionCatalog::new();
        catalog.upsert(summary("a", 10));
        catalog.upsert(summary("b", 60 * 24 * 365 * 100));
        catalog.move_to_front(&SessionId::from("a")).unwrap();
        assert_eq!(ids(&catalog), ["a", "b"]);

        // a later recency-based placement keeps it in front
        catalog.upsert(summary("c", 20));
        assert_eq!(ids(&catalog), ["a", "b", "c"]);
    }

    #[test]
    fn move_to_front_missing_errors() {
        let catalog = SessionCatalog::new();
        assert_matches!(
            catalog.move_to_front(&SessionId::from("x")),
            Err(CatalogError::NotFound(_))
        );
    }

    #[test]
    fn removing_selected_moves_selection_to_next_most_recent() {
        let catalog = SessionCatalog::new();
        catalog.upsert(summary("a", 10));
        catalog.upsert(summary("b", 20));
        catalog.upsert(summary("c", 30));
        catalog.select(&SessionId::from("c")).unwrap();

        let _ = catalog.remove(&SessionId::from("c"));
        assert_eq!(catalog.selected(), Some(SessionId::from("b")));
        assert_eq!(ids(&catalog), ["b", "a"]);

        let _ = catalog.remove(&SessionId::from("b"));
        let _ = catalog.remove(&SessionId::from("a"));
        assert_eq!(catalog.selected(), None);
        assert!(catalog.is_empty());
    }

    #[test]
    fn removing_other_session_keeps_selection() {
        let catalog = SessionCatalog::new();
        catalog.upsert(summary("a", 10));
        catalog.upsert(summary("b", 20));
        catalog.select(&SessionId::from("a")).unwrap();
        let _ = catalog.remove(&SessionId::from("b"));
        assert_eq!(catalog.selected(), Some(SessionId::from("a")));
    }

    #[test]
    fn select_unknown_fails() {
        let catalog = SessionCatalog::new();
        assert_matches!(catalog.select(&SessionId::from("x")), Err(CatalogError::NotFound(_)));
    }

    #[test]
    fn replace_key_migrates_history_position_and_selection() {
        let catalog = SessionCatalog::new();
        catalog.upsert(summary("a", 10));
        let mut provisional = Session::provisional("draft");
        provisional.messages.push(Message::provisional_user("hello"));
        let local = provisional.id.clone();
        catalog.insert(provisional);
        catalog.move_to_front(&local).unwrap();
        catalog.select(&local).unwrap();

        catalog.replace_key(&local, SessionId::from("srv")).unwrap();

        assert!(catalog.get(&local).is_none());
        let session = catalog.get(&SessionId::from("srv")).unwrap();
        assert_eq!(session.messages.len(), 1);
        assert!(!session.provisional);
        assert_eq!(ids(&catalog), ["srv", "a"]);
        assert_eq!(catalog.selected(), Some(SessionId::from("srv")));
    }

    #[test]
    fn replace_key_absorbs_bare_summary() {
        let catalog = SessionCatalog::new();
        let provisional = Session::provisional("draft");
        let local = provisional.id.clone();
        catalog.insert(provisional);
        catalog.upsert(summary("srv", 5));

        catalog.replace_key(&local, SessionId::from("srv")).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.ordered_ids(), [SessionId::from("srv")]);
    }

    #[test]
    fn replace_key_conflicts_with_loaded_session() {
        let catalog = SessionCatalog::new();
        let provisional = Session::provisional("draft");
        let local = provisional.id.clone();
        catalog.insert(provisional);
        catalog.upsert(summary("srv", 5));
        catalog.transact(|state| state.session_mut(&SessionId::from("srv")).unwrap().hydrated = true);

        assert_matches!(
            catalog.replace_key(&local, SessionId::from("srv")),
            Err(CatalogError::KeyConflict { .. })
        );
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn merge_into_keeps_target_history_and_takes_selection() {
        let catalog = SessionCatalog::new();
        catalog.upsert(summary("srv", 10));
        catalog.upsert(summary("other", 20));
        let draft = Session::provisional("draft");
        let draft_id = draft.id.clone();
        catalog.insert(draft);
        catalog.transact(|state| {
            let target = state.session_mut(&SessionId::from("srv")).unwrap();
            target.messages.push(Message::provisional_user("loaded"));
            target.hydrated = true;
            state.session_mut(&draft_id).unwrap().messages.push(Message::provisional_user("typed"));
        });
        catalog.select(&draft_id).unwrap();

        catalog
            .transact(|state| state.merge_into(&draft_id, &SessionId::from("srv")))
            .unwrap();

        assert!(catalog.get(&draft_id).is_none());
        assert_eq!(catalog.selected(), Some(SessionId::from("srv")));
        let merged = catalog.get(&SessionId::from("srv")).unwrap();
        let contents: Vec<&str> = merged.messages.iter().filter_map(|m| m.content.as_deref()).collect();
        assert_eq!(contents, ["loaded", "typed"]);
        assert_eq!(merged.title.as_deref(), Some("title srv"));
        assert_eq!(ids(&catalog)[0], "srv");
        catalog.inspect(CatalogState::check_invariants);
    }

    #[test]
    fn replace_key_same_id_is_noop_and_missing_fails() {
        let catalog = SessionCatalog::new();
        catalog.upsert(summary("a", 1));
        catalog.replace_key(&SessionId::from("a"), SessionId::from("a")).unwrap();
        assert_matches!(
            catalog.replace_key(&SessionId::from("zz"), SessionId::from("a")),
            Err(CatalogError::NotFound(_))
        );
    }

    #[test]
    fn sync_drops_unreported_confirmed_sessions_only() {
        let catalog = SessionCatalog::new();
        catalog.upsert(summary("gone", 1));
        catalog.upsert(summary("busy", 2));
        catalog.transact(|state| {
            state
                .session_mut(&SessionId::from("busy"))
                .unwrap()
                .messages
                .push(Message::provisional_user("waiting"));
        });
        let provisional = Session::provisional("draft");
        let local = provisional.id.clone();
        catalog.insert(provisional);

        let dropped = catalog.sync_summaries(vec![summary("new", 3)]);

        assert_eq!(dropped, [SessionId::from("gone")]);
        assert!(catalog.contains(&SessionId::from("busy")));
        assert!(catalog.contains(&local));
        assert!(catalog.contains(&SessionId::from("new")));
    }

    #[test]
    fn attach_uploads_links_matching_messages() {
        use chronos_core::ids::UploadId;
        use chronos_core::session::ExtractionStatus;

        let mut session = Session::provisional("x");
        let message = Message::provisional_user("see file");
        let message_id = message.id.clone();
        session.messages.push(message);

        let upload = |id: &str, message_id| UploadArtifact {
            id: UploadId::from(id),
            session_id: SessionId::from("x"),
            message_id,
            filename: format!("{id}.csv"),
            stored_path: format!("x/{id}.csv"),
            mime_type: None,
            size_bytes: None,
            extraction_status: ExtractionStatus::Complete,
            extraction_result: None,
            created_at: at(0),
        };
        attach_uploads(
            &mut session,
            vec![upload("u1", Some(message_id)), upload("u2", Some(chronos_core::ids::MessageId::from("other")))],
        );

        assert_eq!(session.uploads.len(), 2);
        assert_eq!(session.messages[0].uploads.len(), 1);
        assert_eq!(session.messages[0].uploads[0].id, UploadId::from("u1"));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Upsert(u8, i64),
        InsertProvisional,
        Remove(u8),
        MoveToFront(u8),
        Rename(u8, u8),
        Select(u8),
        Sync(Vec<u8>),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6, 0i64..100).prop_map(|(k, t)| Op::Upsert(k, t)),
            Just(Op::InsertProvisional),
            (0u8..8).prop_map(Op::Remove),
            (0u8..8).prop_map(Op::MoveToFront),
            (0u8..8, 0u8..6).prop_map(|(a, b)| Op::Rename(a, b)),
            (0u8..8).prop_map(Op::Select),
            proptest::collection::vec(0u8..6, 0..4).prop_map(Op::Sync),
        ]
    }

    /// Resolve a small index to an existing key when possible.
    fn pick(catalog: &SessionCatalog, k: u8) -> SessionId {
        let order = catalog.ordered_ids();
        if order.is_empty() {
            SessionId::from(format!("s{k}"))
        } else {
            order[k as usize % order.len()].clone()
        }
    }

    proptest! {
        #[test]
        fn order_always_matches_sessions(ops in proptest::collection::vec(op(), 1..40)) {
            let catalog = SessionCatalog::new();
            for op in ops {
                match op {
                    Op::Upsert(k, t) => catalog.upsert(summary(&format!("s{k}"), t)),
                    Op::InsertProvisional => catalog.insert(Session::provisional("p")),
                    Op::Remove(k) => { let _ = catalog.remove(&pick(&catalog, k)); }
                    Op::MoveToFront(k) => { let _ = catalog.move_to_front(&pick(&catalog, k)); }
                    Op::Rename(a, b) => {
                        let _ = catalog.replace_key(&pick(&catalog, a), SessionId::from(format!("s{b}")));
                    }
                    Op::Select(k) => { let _ = catalog.select(&pick(&catalog, k)); }
                    Op::Sync(keys) => {
                        let _ = catalog.sync_summaries(keys.iter().map(|k| summary(&format!("s{k}"), i64::from(*k))).collect());
                    }
                }
                catalog.transact(|state| state.check_invariants());
            }
        }
    }
}
