// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-cutting error classification.
//!
//! Every fallible operation in this workspace ultimately reports one of six
//! kinds. Concrete error enums in `fsman-registry`, `fsman-supervisor`,
//! `fsman-monitor`, and `fsman-manager` each implement [`Classify`] so
//! callers translating an error into a control-plane response (or deciding
//! whether to retry) don't need to match on every crate's concrete error
//! type.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    FailedPrecondition,
    DeviceBusy,
    Unavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::FailedPrecondition => "failed_precondition",
            ErrorKind::DeviceBusy => "device_busy",
            ErrorKind::Unavailable => "unavailable",
        };
        write!(f, "{s}")
    }
}

/// Implemented by every crate-local error enum so a caller can ask "what
/// kind of thing went wrong" without matching on concrete variants.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}
