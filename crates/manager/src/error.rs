// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fsman_core::{Classify, DaemonId, ErrorKind, SnapshotId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("daemon {0} already exists")]
    DaemonAlreadyExists(DaemonId),

    #[error("daemon {0} not found")]
    DaemonNotFound(DaemonId),

    #[error("rafs instance {0} already exists")]
    InstanceAlreadyExists(SnapshotId),

    #[error("rafs instance {0} not found")]
    InstanceNotFound(SnapshotId),

    #[error("daemon {0} reported AlreadyMounted for {1}")]
    AlreadyMounted(DaemonId, String),

    #[error("timed out waiting for daemon {0} control socket to appear")]
    SocketWaitTimedOut(DaemonId),

    #[error("timed out waiting for daemon {0} to reach state {1}")]
    StateWaitTimedOut(DaemonId, fsman_core::DaemonState),

    #[error("failed to spawn daemon process: {0}")]
    Spawn(std::io::Error),

    #[error("control client error: {0}")]
    Control(String),

    #[error("daemon control API returned {code}: {message}")]
    DaemonApi { code: String, message: String },

    #[error(transparent)]
    Registry(#[from] fsman_registry::RegistryError),

    #[error(transparent)]
    Supervisor(#[from] fsman_supervisor::SupervisorError),

    #[error(transparent)]
    Monitor(#[from] fsman_monitor::MonitorError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Classify for ManagerError {
    fn kind(&self) -> ErrorKind {
        match self {
            ManagerError::DaemonAlreadyExists(_) | ManagerError::InstanceAlreadyExists(_) => {
                ErrorKind::AlreadyExists
            }
            ManagerError::DaemonNotFound(_) | ManagerError::InstanceNotFound(_) => ErrorKind::NotFound,
            ManagerError::AlreadyMounted(_, _) => ErrorKind::FailedPrecondition,
            ManagerError::SocketWaitTimedOut(_)
            | ManagerError::StateWaitTimedOut(_, _)
            | ManagerError::Control(_)
            | ManagerError::DaemonApi { .. } => ErrorKind::Unavailable,
            ManagerError::Spawn(_) | ManagerError::Io(_) => ErrorKind::Unavailable,
            ManagerError::Registry(e) => e.kind(),
            ManagerError::Supervisor(e) => e.kind(),
            ManagerError::Monitor(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;
