//! # chronos-engine
//!
//! Client-side state for the Chronos chat backend.
//!
//! - [`catalog`]: the session store, its recency order and selection
//! - [`reconciler`]: optimistic submissions, commit and rollback
//! - [`hydrator`]: on-demand history loading, one fetch per session
//! - [`engine`]: [`ChatEngine`], the facade front ends use

#![deny(unsafe_code)]

pub mod catalog;
pub mod engine;
pub mod error;
pub mod hydrator;
pub mod reconciler;

#[cfg(test)]
mod testing;

pub use catalog::SessionCatalog;
pub use engine::{ChatEngine, SubmitInput, SubmitOutcome};
pub use error::{CatalogError, EngineError, HydrateError, SubmitError};
pub use hydrator::{HydrateOutcome, SessionHydrator};
pub use reconciler::{CommitOutcome, OptimisticReconciler, ProvisionalHandle, validate};
