// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fsman_core::{Classify, DaemonId, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("supervisor for daemon {0} not found")]
    NotFound(DaemonId),

    #[error("supervisor for daemon {0} already exists")]
    AlreadyExists(DaemonId),

    #[error("socket operation failed: {0}")]
    Errno(#[from] nix::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer ended with no payload and no control message")]
    EmptyTransfer,

    #[error("sendmsg wrote zero bytes with payload remaining")]
    ShortWrite,

    #[error("timed out waiting for a peer to connect")]
    AcceptTimeout,
}

impl Classify for SupervisorError {
    fn kind(&self) -> ErrorKind {
        match self {
            SupervisorError::NotFound(_) => ErrorKind::NotFound,
            SupervisorError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            SupervisorError::AcceptTimeout => ErrorKind::Unavailable,
            SupervisorError::Errno(_)
            | SupervisorError::Io(_)
            | SupervisorError::EmptyTransfer
            | SupervisorError::ShortWrite => ErrorKind::Unavailable,
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
