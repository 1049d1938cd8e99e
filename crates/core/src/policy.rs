// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery policy (§1.4.D "Recovery policies"), configured process-wide.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Death events are logged; no recovery.
    #[default]
    None,
    /// Cold restart: re-launch the daemon, re-mount instances.
    Restart,
    /// Warm failover: hand state from the supervisor to a successor process.
    Failover,
}

impl RecoveryPolicy {
    /// Only `Failover` daemons get a supervisor record (§1.3 "Lifecycle
    /// summary").
    pub fn needs_supervisor(&self) -> bool {
        matches!(self, RecoveryPolicy::Failover)
    }
}
