// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fsman_core::{Classify, DaemonId, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("already subscribed to daemon {0}")]
    AlreadyExists(DaemonId),

    #[error("no subscription for daemon {0}")]
    NotFound(DaemonId),

    #[error("failed to connect to daemon control socket within the backoff window: {0}")]
    ConnectTimedOut(std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Classify for MonitorError {
    fn kind(&self) -> ErrorKind {
        match self {
            MonitorError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            MonitorError::NotFound(_) => ErrorKind::NotFound,
            MonitorError::ConnectTimedOut(_) | MonitorError::Io(_) => ErrorKind::Unavailable,
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
