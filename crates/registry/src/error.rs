// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fsman_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("daemon {0} already exists")]
    DaemonAlreadyExists(String),

    #[error("daemon {0} not found")]
    DaemonNotFound(String),

    #[error("rafs instance {0} already exists")]
    InstanceAlreadyExists(String),

    #[error("store was written by a newer schema version ({found}), this binary supports up to {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("migration from schema version {0} failed: {1}")]
    MigrationFailed(u32, String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl Classify for RegistryError {
    fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::DaemonAlreadyExists(_) | RegistryError::InstanceAlreadyExists(_) => {
                ErrorKind::AlreadyExists
            }
            RegistryError::DaemonNotFound(_) => ErrorKind::NotFound,
            RegistryError::SchemaTooNew { .. } | RegistryError::MigrationFailed(_, _) => {
                ErrorKind::FailedPrecondition
            }
            RegistryError::Sqlite(_) | RegistryError::Encoding(_) => ErrorKind::Unavailable,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
