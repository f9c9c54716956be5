//! Drives a submit response body to its terminal frame.

use bytes::Bytes;
use chronos_core::errors::{ApiError, ProtocolError};
use chronos_core::wire::{ChatTurn, StreamFrame};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::SubmitObserver;
use crate::frame::decode_frames;

/// Consume a byte stream until its `result` frame.
///
/// Progress and session frames are forwarded to `observer`. The byte stream
/// is dropped as soon as the result is decoded, on error, and on
/// cancellation, so nothing after the result is ever read.
pub async fn drive_stream<S, E>(
    byte_stream: S,
    observer: &dyn SubmitObserver,
    cancel: &CancellationToken,
) -> Result<ChatTurn, ApiError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut frames = decode_frames(byte_stream);
    let mut assigned = false;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("submit stream cancelled");
                return Err(ApiError::Cancelled);
            }
            next = frames.next() => next,
        };

        match next {
            Some(Ok(StreamFrame::Progress { step })) => observer.on_progress(step),
            Some(Ok(StreamFrame::Session(assignment))) => {
                if assigned {
                    warn!(session_id = %assignment.session_id, "ignoring repeated session frame");
                    continue;
                }
                assigned = true;
                observer.on_session_assigned(&assignment);
            }
            Some(Ok(StreamFrame::Result { payload })) => return Ok(*payload),
            Some(Err(e)) => return Err(ApiError::Network(e.to_string())),
            None => return Err(ProtocolError::StreamIncomplete.into()),
        }
    }
}
