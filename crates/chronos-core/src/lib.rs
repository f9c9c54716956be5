//! # chronos-core
//!
//! Foundation types shared by every Chronos crate:
//!
//! - **Branded IDs**: `SessionId`, `MessageId`, `UploadId` as newtypes, with
//!   locally generated (provisional) variants
//! - **Domain model**: `Session`, `Message` with a tagged `MessageState`,
//!   `UploadArtifact`, `SessionSummary`
//! - **Wire types**: DTOs for the chat HTTP API and the streamed frame events
//! - **Errors**: `ApiError`, `ProtocolError`, `ValidationError` via `thiserror`
//! - **Titles**: the pure title/placeholder derivation used for new sessions

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod messages;
pub mod session;
pub mod time;
pub mod title;
pub mod wire;
