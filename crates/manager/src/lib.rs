// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fsman-manager: the daemon & RAFS-instance lifecycle manager. Coordinates
//! the persistent registry, the supervisor set, and the liveness monitor
//! around one in-memory daemon cache, and speaks the daemon's HTTP-over-UDS
//! control API.

mod argv;
mod cache;
mod client;
mod error;
mod manager;
mod wire;

pub use argv::{build_argv, resolve_bootstrap, StartArgs};
pub use cache::ManagedDaemon;
pub use client::{ControlClient, DEFAULT_CLIENT_TIMEOUT};
pub use error::{ManagerError, Result};
pub use manager::{Manager, RecoverResult, DEATH_CHANNEL_CAPACITY};
pub use wire::{BlobCacheBindCmd, DaemonErrorBody, DaemonInfo, FsBackendMountCmd, FsBackendUmountCmd};
