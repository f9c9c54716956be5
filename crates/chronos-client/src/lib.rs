//! # chronos-client
//!
//! Network side of the Chronos chat client.
//!
//! - [`frame`]: incremental decoder for streamed submit responses
//! - [`stream`]: drives a response body to its terminal `result` frame
//! - [`api`]: the [`ChatApi`] trait and its request types
//! - [`http`]: [`HttpChatApi`], the reqwest implementation

#![deny(unsafe_code)]

pub mod api;
pub mod frame;
pub mod http;
pub mod stream;

pub use api::{ChatApi, FileAttachment, SubmitObserver, SubmitRequest};
pub use frame::{FrameDecoder, decode_frames};
pub use http::HttpChatApi;
pub use stream::drive_stream;
