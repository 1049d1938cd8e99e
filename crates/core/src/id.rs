// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions.
//!
//! Daemon IDs and snapshot IDs are caller-supplied (the container engine
//! names both), so these are thin newtype wrappers around `String` rather
//! than the fixed-capacity inline buffer a random-ID scheme would want —
//! there is no guaranteed maximum length to size a buffer against.

/// Define a newtype wrapper around `String` with a descriptive name, used
/// for IDs whose values are supplied by an external caller (the container
/// engine) rather than generated here.
#[macro_export]
macro_rules! define_external_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }
    };
}

define_external_id! {
    /// Unique, stable-across-restarts identifier for an FS daemon.
    ///
    /// Also used as the supervisor key (`<supervisor_root>/<id>.sock`).
    pub struct DaemonId;
}

define_external_id! {
    /// Unique identifier for one RAFS instance, supplied by the engine.
    pub struct SnapshotId;
}

/// Truncate a string to at most `n` bytes on a char boundary, for short
/// display purposes (log lines, table columns).
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        return s;
    }
    let mut end = n;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
