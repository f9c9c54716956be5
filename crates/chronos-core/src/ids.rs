//! Branded ID newtypes for type safety.
//!
//! Server-assigned IDs are opaque strings (UUIDs in practice). IDs created on
//! the client before the server has confirmed an entity carry the
//! [`LOCAL_PREFIX`] so they can never collide with a server UUID.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix carried by every locally generated (provisional) ID.
pub const LOCAL_PREFIX: &str = "local-";

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a provisional ID (UUID v7, time-ordered, local prefix).
            #[must_use]
            pub fn local() -> Self {
                Self(format!("{LOCAL_PREFIX}{}", Uuid::now_v7()))
            }

            /// Wrap an existing (usually server-assigned) value.
            #[must_use]
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Whether this ID was generated on the client.
            #[must_use]
            pub fn is_local(&self) -> bool {
                self.0.starts_with(LOCAL_PREFIX)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

branded_id! {
    /// Identifier of a conversation session.
    SessionId
}

branded_id! {
    /// Identifier of a message within a session.
    MessageId
}

branded_id! {
    /// Identifier of an uploaded file artifact.
    UploadId
}
