// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory runtime state for one daemon (§1.4.D "per-daemon inner mutex
//! for runtime-field edits"). Never persisted directly — rebuilt from the
//! registry on recovery.

use fsman_core::{DaemonId, DaemonRecord, DaemonState, RecoveryPolicy, SnapshotId};
use parking_lot::Mutex;

struct Inner {
    record: DaemonRecord,
    state: DaemonState,
    process_id: Option<u32>,
    recovery_policy: RecoveryPolicy,
    instances: Vec<SnapshotId>,
}

pub struct ManagedDaemon {
    pub id: DaemonId,
    inner: Mutex<Inner>,
}

impl ManagedDaemon {
    pub fn new(record: DaemonRecord, recovery_policy: RecoveryPolicy) -> Self {
        Self {
            id: record.id.clone(),
            inner: Mutex::new(Inner { record, state: DaemonState::Unknown, process_id: None, recovery_policy, instances: Vec::new() }),
        }
    }

    pub fn record(&self) -> DaemonRecord {
        self.inner.lock().record.clone()
    }

    pub fn update_record(&self, record: DaemonRecord) {
        self.inner.lock().record = record;
    }

    pub fn state(&self) -> DaemonState {
        self.inner.lock().state
    }

    /// Returns whether the transition was legal (per `DaemonState::can_transition_to`).
    pub fn try_set_state(&self, to: DaemonState) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.can_transition_to(to) {
            inner.state = to;
            true
        } else {
            false
        }
    }

    /// Force a state unconditionally: used only by the liveness monitor's
    /// HUP handler and by `destroy_daemon`'s best-effort cleanup, both of
    /// which must win regardless of the current state.
    pub fn force_state(&self, to: DaemonState) {
        self.inner.lock().state = to;
    }

    pub fn process_id(&self) -> Option<u32> {
        self.inner.lock().process_id
    }

    pub fn set_process_id(&self, pid: Option<u32>) {
        self.inner.lock().process_id = pid;
    }

    pub fn recovery_policy(&self) -> RecoveryPolicy {
        self.inner.lock().recovery_policy
    }

    pub fn attach_instance(&self, id: SnapshotId) {
        let mut inner = self.inner.lock();
        if !inner.instances.contains(&id) {
            inner.instances.push(id);
        }
    }

    pub fn detach_instance(&self, id: &SnapshotId) {
        self.inner.lock().instances.retain(|existing| existing != id);
    }

    pub fn instances(&self) -> Vec<SnapshotId> {
        self.inner.lock().instances.clone()
    }
}
