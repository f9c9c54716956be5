//! In-memory `ChatApi` and payload builders for engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use chronos_client::{ChatApi, SubmitObserver, SubmitRequest};
use chronos_core::errors::ApiError;
use chronos_core::ids::{MessageId, SessionId, UploadId};
use chronos_core::messages::Role;
use chronos_core::session::ExtractionStatus;
use chronos_core::wire::{
    ChatTurn, MessageDto, ProgressStep, SessionAssignment, SessionDetail, SessionSummaryDto,
    UploadArtifactDto,
};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub(crate) fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap() + Duration::seconds(seconds)
}

pub(crate) fn message(id: &str, role: Role, seq: i64) -> MessageDto {
    MessageDto {
        id: MessageId::from(id),
        role,
        content: Some(format!("{id} text")),
        raw_payload: None,
        sequence_index: seq,
        created_at: at(seq),
    }
}

fn upload(session: &str, id: &str, message_id: Option<&str>) -> UploadArtifactDto {
    UploadArtifactDto {
        id: UploadId::from(id),
        session_id: SessionId::from(session),
        message_id: message_id.map(MessageId::from),
        original_filename: format!("{id}.csv"),
        stored_path: format!("{session}/{id}.csv"),
        mime_type: Some("text/csv".into()),
        size_bytes: Some(3),
        extraction_status: ExtractionStatus::Complete,
        extraction_result: None,
        created_at: at(0),
    }
}

/// Turn with message IDs `{session}[-{tag}]-user`, `-tool-{i}`, `-assistant`.
fn build_turn(session: &str, tag: Option<&str>, tools: usize, uploads: &[(&str, Option<&str>)]) -> ChatTurn {
    let prefix = match tag {
        Some(tag) => format!("{session}-{tag}"),
        None => session.to_string(),
    };
    let tool_count = i64::try_from(tools).unwrap();
    ChatTurn {
        session_id: SessionId::from(session),
        session_title: Some("Server title".into()),
        created_new_session: true,
        user_message: message(&format!("{prefix}-user"), Role::User, 0),
        tool_messages: (0..tools)
            .map(|i| message(&format!("{prefix}-tool-{i}"), Role::Tool, i64::try_from(i).unwrap() + 1))
            .collect(),
        assistant_message: message(&format!("{prefix}-assistant"), Role::Assistant, tool_count + 1),
        uploads: uploads.iter().map(|(id, m)| upload(session, id, *m)).collect(),
        forecast_job_id: None,
        chronos_response: None,
    }
}

pub(crate) fn turn(session: &str, tools: usize) -> ChatTurn {
    build_turn(session, None, tools, &[])
}

pub(crate) fn turn_tagged(session: &str, tag: &str, tools: usize) -> ChatTurn {
    build_turn(session, Some(tag), tools, &[])
}

pub(crate) fn turn_with(session: &str, tools: usize, uploads: &[(&str, Option<&str>)]) -> ChatTurn {
    build_turn(session, None, tools, uploads)
}

pub(crate) fn detail(session: &str, messages: usize) -> SessionDetail {
    let first_message = format!("{session}-h0");
    SessionDetail {
        session_id: SessionId::from(session),
        session_title: Some(format!("{session} history")),
        created_at: at(0),
        updated_at: at(100),
        messages: (0..messages)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                message(&format!("{session}-h{i}"), role, i64::try_from(i).unwrap())
            })
            .collect(),
        uploads: vec![upload(session, "h-up", Some(first_message.as_str()))],
    }
}

pub(crate) fn summary_dto(id: &str, updated: i64) -> SessionSummaryDto {
    SessionSummaryDto {
        id: SessionId::from(id),
        title: Some(format!("{id} title")),
        created_at: at(0),
        updated_at: at(updated),
        last_message_at: None,
        message_count: 2,
    }
}

/// Scripted behaviour of one `submit` call.
pub(crate) enum MockSubmit {
    /// Emit progress (and an optional assignment), then return the turn.
    Turn {
        progress: Vec<ProgressStep>,
        assignment: Option<SessionAssignment>,
        turn: ChatTurn,
    },
    /// Fail immediately.
    Error(ApiError),
    /// Emit progress, then wait for cancellation.
    Hang(Vec<ProgressStep>),
    /// Return the turn once `gate` is notified, ignoring cancellation.
    Gated { gate: Arc<Notify>, turn: ChatTurn },
}

impl MockSubmit {
    pub(crate) fn turn(turn: ChatTurn) -> Self {
        Self::Turn {
            progress: Vec::new(),
            assignment: None,
            turn,
        }
    }
}

/// `ChatApi` double with scripted responses and call counters.
#[derive(Default)]
pub(crate) struct MockApi {
    submits: Mutex<VecDeque<MockSubmit>>,
    details: Mutex<HashMap<SessionId, SessionDetail>>,
    summaries: Mutex<Vec<SessionSummaryDto>>,
    delete_error: Mutex<Option<ApiError>>,
    detail_gate: Mutex<Option<Arc<Notify>>>,
    pub(crate) requests: Mutex<Vec<SubmitRequest>>,
    submit_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MockApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_submit(&self, response: MockSubmit) {
        self.submits.lock().push_back(response);
    }

    pub(crate) fn set_detail(&self, detail: SessionDetail) {
        let _ = self.details.lock().insert(detail.session_id.clone(), detail);
    }

    pub(crate) fn set_summaries(&self, summaries: Vec<SessionSummaryDto>) {
        *self.summaries.lock() = summaries;
    }

    pub(crate) fn fail_deletes_with(&self, error: ApiError) {
        *self.delete_error.lock() = Some(error);
    }

    /// Make detail fetches wait until the returned handle is notified.
    pub(crate) fn gate_details(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.detail_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn submit(
        &self,
        request: SubmitRequest,
        observer: &dyn SubmitObserver,
        cancel: &CancellationToken,
    ) -> Result<ChatTurn, ApiError> {
        let _ = self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);
        let next = self.submits.lock().pop_front();
        match next {
            Some(MockSubmit::Turn {
                progress,
                assignment,
                turn,
            }) => {
                for step in progress {
                    observer.on_progress(step);
                }
                if let Some(assignment) = assignment {
                    observer.on_session_assigned(&assignment);
                }
                if cancel.is_cancelled() {
                    return Err(ApiError::Cancelled);
                }
                Ok(turn)
            }
            Some(MockSubmit::Error(e)) => Err(e),
            Some(MockSubmit::Hang(progress)) => {
                for step in progress {
                    observer.on_progress(step);
                }
                cancel.cancelled().await;
                Err(ApiError::Cancelled)
            }
            Some(MockSubmit::Gated { gate, turn }) => {
                gate.notified().await;
                Ok(turn)
            }
            None => Err(ApiError::Network("no scripted response".into())),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummaryDto>, ApiError> {
        Ok(self.summaries.lock().clone())
    }

    async fn session_detail(
        &self,
        session_id: &SessionId,
        cancel: &CancellationToken,
    ) -> Result<SessionDetail, ApiError> {
        let _ = self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.detail_gate.lock().clone();
        if let Some(gate) = gate {
            tokio::select! {
                () = cancel.cancelled() => return Err(ApiError::Cancelled),
                () = gate.notified() => {}
            }
        }
        self.details
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))
    }

    async fn delete_session(&self, _session_id: &SessionId) -> Result<(), ApiError> {
        let _ = self.delete_calls.fetch_add(1, Ordering::SeqCst);
        match self.delete_error.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
