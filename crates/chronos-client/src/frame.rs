//! # Frame decoder
//!
//! Incremental decoder for the submit stream. The response body is a
//! sequence of frames separated by a blank line; each frame holds one or
//! more `data:` lines whose joined payload is a JSON [`StreamFrame`].
//!
//! The decoder owns all buffering: bytes are accumulated until a blank line
//! is seen, complete frames are parsed, and the remainder is carried into the
//! next [`FrameDecoder::push`]. It knows nothing about HTTP, so chunk splits
//! at arbitrary byte positions can be tested directly.
//!
//! Frames that are not valid UTF-8, not JSON, or of an unknown `type` are
//! skipped with a warning.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use chronos_core::wire::{ChatTurn, StreamFrame};
use futures::Stream;
use futures::StreamExt;
use tracing::{debug, warn};

/// Buffers raw bytes and yields complete frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Bytes already searched for a delimiter without finding one.
    scanned: usize,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            scanned: 0,
        }
    }

    /// Append a chunk and return every frame it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some((frame_end, consumed)) = find_blank_line(&self.buffer, self.scanned) {
            let raw = self.buffer.split_to(consumed);
            self.scanned = 0;
            if let Some(frame) = parse_frame(&raw[..frame_end]) {
                frames.push(frame);
            }
        }
        // A delimiter may straddle the next chunk boundary.
        self.scanned = self.buffer.len().saturating_sub(2);
        frames
    }

    /// Flush at end of stream.
    ///
    /// Parses whatever is left as a final frame, which covers a last frame
    /// sent without its trailing blank line and an unframed JSON body.
    pub fn finish(&mut self) -> Option<StreamFrame> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = self.buffer.split();
        self.scanned = 0;
        parse_frame(&raw)
    }

    /// Discard buffered partial data.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }

    /// Bytes held awaiting a delimiter.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Locate the first blank line at or after `from`: `\n\n` or `\n\r\n`.
///
/// Returns the length of the frame before it and the number of bytes to
/// consume including the delimiter.
fn find_blank_line(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i < buf.len() {
        if buf[i] == b'\n' {
            match buf.get(i + 1) {
                Some(b'\n') => return Some((i, i + 2)),
                Some(b'\r') if buf.get(i + 2) == Some(&b'\n') => return Some((i, i + 3)),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Parse one frame body (without its delimiter).
fn parse_frame(raw: &[u8]) -> Option<StreamFrame> {
    let Ok(text) = std::str::from_utf8(raw) else {
        warn!(len = raw.len(), "skipping frame with invalid UTF-8");
        return None;
    };

    let mut data_lines = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            data_lines.push(data.trim_start());
        }
    }

    if data_lines.is_empty() {
        let body = text.trim();
        if body.starts_with('{') {
            return parse_unframed(body);
        }
        if !body.is_empty() {
            debug!(preview = truncate(body, 80), "skipping frame without data");
        }
        return None;
    }

    let payload = data_lines.join("\n");
    match serde_json::from_str::<StreamFrame>(&payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, preview = truncate(&payload, 100), "skipping malformed frame");
            None
        }
    }
}

/// A JSON object with no `data:` prefix: either a bare frame or the full
/// non-streaming payload.
fn parse_unframed(body: &str) -> Option<StreamFrame> {
    if let Ok(frame) = serde_json::from_str::<StreamFrame>(body) {
        return Some(frame);
    }
    match serde_json::from_str::<ChatTurn>(body) {
        Ok(turn) => Some(StreamFrame::Result {
            payload: Box::new(turn),
        }),
        Err(e) => {
            warn!(error = %e, preview = truncate(body, 100), "skipping unframed body");
            None
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Turn a byte stream into a lazy, finite stream of frames.
///
/// A transport error is yielded once as `Err` and ends the stream. Dropping
/// the returned stream drops the byte stream and any buffered bytes.
pub fn decode_frames<S, E>(byte_stream: S) -> impl Stream<Item = Result<StreamFrame, E>> + Unpin
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let state = (byte_stream, FrameDecoder::new(), VecDeque::new(), false);
    Box::pin(futures::stream::unfold(
        state,
        |(mut stream, mut decoder, mut ready, mut done)| async move {
            loop {
                if let Some(frame) = ready.pop_front() {
                    return Some((Ok(frame), (stream, decoder, ready, done)));
                }
                if done {
                    return None;
                }
                match stream.next().await {
                    Some(Ok(chunk)) => ready.extend(decoder.push(&chunk)),
                    Some(Err(e)) => {
                        decoder.reset();
                        return Some((Err(e), (stream, decoder, ready, true)));
                    }
                    None => {
                        done = true;
                        ready.extend(decoder.finish());
                    }
                }
            }
        },
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
