// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`Manager`]: the daemon & RAFS lifecycle manager (§1.4.D).
//!
//! Call sites that need to spawn detached tasks referencing the manager
//! itself (start-daemon, destroy-daemon, the death-event loop) take
//! `self: &Arc<Self>` — the manager is meant to be constructed once behind
//! an `Arc` and shared across the process.

use crate::argv::{build_argv, resolve_bootstrap, StartArgs};
use crate::cache::ManagedDaemon;
use crate::client::ControlClient;
use crate::error::{ManagerError, Result};
use crate::wire::FsBackendMountCmd;
use fsman_core::{DaemonId, DaemonMode, DaemonRecord, DaemonState, DeathEvent, FsDriver, RafsInstance, RecoveryPolicy};
use fsman_monitor::LivenessMonitor;
use fsman_registry::PersistentRegistry;
use fsman_supervisor::SupervisorSet;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

const WAIT_SOCKET_TIMEOUT: Duration = Duration::from_secs(10);
const WAIT_SOCKET_POLL: Duration = Duration::from_millis(50);
const WAIT_STATE_TIMEOUT: Duration = Duration::from_secs(2);
const WAIT_STATE_POLL: Duration = Duration::from_millis(100);
const SUPERVISOR_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Death-event channel capacity (§1.5).
pub const DEATH_CHANNEL_CAPACITY: usize = 32;

/// Output of [`Manager::recover`]: persisted daemons partitioned by whether
/// their process is confirmed running.
pub struct RecoverResult {
    pub live: Vec<DaemonId>,
    pub recovering: Vec<DaemonId>,
}

pub struct Manager {
    registry: Arc<PersistentRegistry>,
    supervisors: Arc<SupervisorSet>,
    monitor: Arc<LivenessMonitor>,
    daemon_binary: PathBuf,
    default_recovery_policy: RecoveryPolicy,
    /// `fs_driver`s this process currently serves; [`Self::recover`] skips
    /// any persisted daemon record outside this set (§1.4.D).
    allowed_fs_drivers: Vec<FsDriver>,
    control_socket_timeout: Duration,
    cache: AsyncMutex<HashMap<DaemonId, Arc<ManagedDaemon>>>,
    death_tx: mpsc::Sender<DeathEvent>,
    death_rx: AsyncMutex<Option<mpsc::Receiver<DeathEvent>>>,
}

impl Manager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<PersistentRegistry>,
        supervisors: Arc<SupervisorSet>,
        monitor: Arc<LivenessMonitor>,
        daemon_binary: impl Into<PathBuf>,
        default_recovery_policy: RecoveryPolicy,
        allowed_fs_drivers: Vec<FsDriver>,
        control_socket_timeout: Duration,
    ) -> Self {
        let (death_tx, death_rx) = mpsc::channel(DEATH_CHANNEL_CAPACITY);
        Self {
            registry,
            supervisors,
            monitor,
            daemon_binary: daemon_binary.into(),
            default_recovery_policy,
            allowed_fs_drivers,
            control_socket_timeout,
            cache: AsyncMutex::new(HashMap::new()),
            death_tx,
            death_rx: AsyncMutex::new(Some(death_rx)),
        }
    }

    async fn get_managed(&self, id: &DaemonId) -> Result<Arc<ManagedDaemon>> {
        self.cache.lock().await.get(id).cloned().ok_or_else(|| ManagerError::DaemonNotFound(id.clone()))
    }

    /// Looks up a cached daemon by id without mutating anything.
    pub async fn get_daemon(&self, id: &DaemonId) -> Result<Arc<ManagedDaemon>> {
        self.get_managed(id).await
    }

    fn control_client(&self, record: &DaemonRecord) -> ControlClient {
        ControlClient::new(&record.api_socket).with_timeout(self.control_socket_timeout)
    }

    // --- Registry + cache operations (§1.4.D operations table) ---

    pub async fn add_daemon(&self, record: DaemonRecord) -> Result<Arc<ManagedDaemon>> {
        let mut cache = self.cache.lock().await;
        if cache.contains_key(&record.id) {
            return Err(ManagerError::DaemonAlreadyExists(record.id));
        }
        self.registry.add_daemon(&record)?;
        let managed = Arc::new(ManagedDaemon::new(record.clone(), self.default_recovery_policy));
        cache.insert(record.id.clone(), managed.clone());
        Ok(managed)
    }

    pub async fn update_daemon(&self, record: DaemonRecord) -> Result<()> {
        let cache = self.cache.lock().await;
        let managed = cache.get(&record.id).ok_or_else(|| ManagerError::DaemonNotFound(record.id.clone()))?;
        self.registry.update_daemon(&record)?;
        managed.update_record(record);
        Ok(())
    }

    /// Plain record removal: registry delete commits before cache removal.
    /// Does not touch the live process — see [`Self::destroy_daemon`] for
    /// the full teardown protocol.
    pub async fn delete_daemon(&self, id: &DaemonId) -> Result<()> {
        let mut cache = self.cache.lock().await;
        self.registry.delete_daemon(id)?;
        cache.remove(id);
        Ok(())
    }

    pub async fn add_rafs_instance(&self, mut instance: RafsInstance) -> Result<RafsInstance> {
        instance.seq = self.registry.next_instance_seq()?;
        self.registry.add_rafs_instance(&instance)?;
        if let Some(daemon_id) = instance.daemon_id.clone() {
            if let Some(managed) = self.cache.lock().await.get(&daemon_id) {
                managed.attach_instance(instance.snapshot_id.clone());
                let mut record = managed.record();
                record.reference_count += 1;
                if let Err(e) = self.registry.update_daemon(&record) {
                    warn!(daemon_id = %daemon_id, error = %e, "add_rafs_instance: failed to persist reference_count");
                } else {
                    managed.update_record(record);
                }
            }
        }
        Ok(instance)
    }

    pub async fn delete_rafs_instance(&self, instance: &RafsInstance) -> Result<()> {
        self.registry.delete_rafs_instance(&instance.snapshot_id)?;
        if let Some(daemon_id) = &instance.daemon_id {
            if let Some(managed) = self.cache.lock().await.get(daemon_id) {
                managed.detach_instance(&instance.snapshot_id);
                let mut record = managed.record();
                record.reference_count = record.reference_count.saturating_sub(1);
                if let Err(e) = self.registry.update_daemon(&record) {
                    warn!(daemon_id = %daemon_id, error = %e, "delete_rafs_instance: failed to persist reference_count");
                } else {
                    managed.update_record(record);
                }
            }
        }
        Ok(())
    }

    /// Mounts one RAFS instance onto an already-`RUNNING` daemon.
    pub async fn mount_instance(&self, instance: &RafsInstance, config_json: &str) -> Result<()> {
        let managed = self.get_managed(
            instance.daemon_id.as_ref().ok_or_else(|| ManagerError::InstanceNotFound(instance.snapshot_id.clone()))?,
        )
        .await?;
        let record = managed.record();
        let client = self.control_client(&record);
        let bootstrap = resolve_bootstrap(instance);
        let mountpoint = record.instance_mountpoint(instance.snapshot_id.as_str());
        let cmd = FsBackendMountCmd::rafs(bootstrap.display().to_string(), config_json.to_string());

        match client.mount(&mountpoint, &cmd).await {
            Ok(()) => Ok(()),
            Err(ManagerError::DaemonApi { code, .. }) if code.eq_ignore_ascii_case("AlreadyMounted") => {
                warn!(snapshot_id = %instance.snapshot_id, "mount reported AlreadyMounted, treating as success");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // --- Start-daemon protocol (§1.4.D) ---

    pub async fn start_daemon(self: &Arc<Self>, id: &DaemonId, upgrade: bool) -> Result<()> {
        let managed = self.get_managed(id).await?;
        let record = managed.record();
        managed.try_set_state(DaemonState::Init);

        let argv = build_argv(&StartArgs {
            record: &record,
            bootstrap: None,
            fscache_dir: None,
            fscache_threads: 0,
            prefetch_files: None,
            upgrade,
        });

        let mut command = std::process::Command::new(&self.daemon_binary);
        command.args(&argv).stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        let child = command.spawn().map_err(ManagerError::Spawn)?;
        managed.set_process_id(Some(child.id()));

        // Persist on a best-effort basis: a failure here is logged, not
        // fatal, since the process is already running.
        if let Err(e) = self.registry.update_daemon(&record) {
            error!(daemon_id = %id, error = %e, "failed to persist daemon record after fork");
        }

        let this = self.clone();
        let daemon_id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = this.finish_start(&daemon_id, child).await {
                error!(daemon_id = %daemon_id, error = %e, "start-daemon protocol failed");
            }
        });

        Ok(())
    }

    async fn finish_start(self: Arc<Self>, id: &DaemonId, mut child: Child) -> Result<()> {
        let managed = self.get_managed(id).await?;
        let record = managed.record();

        wait_for_socket(&record.api_socket, WAIT_SOCKET_TIMEOUT, &mut child, id)?;

        let notifier = self.death_tx.clone();
        self.monitor.subscribe(id.clone(), record.api_socket.clone(), notifier)?;

        managed.try_set_state(DaemonState::Ready);

        let client = self.control_client(&record);
        client.start().await?;
        wait_for_state(&client, id, DaemonState::Running, WAIT_STATE_TIMEOUT, WAIT_STATE_POLL).await?;
        managed.try_set_state(DaemonState::Running);

        let info = client.daemon_info().await?;
        debug!(daemon_id = %id, version = %info.version, "daemon reached RUNNING");

        if record.supervisor_path.is_some() {
            let supervisor = self.supervisors.get_supervisor(id)?;
            let client = self.control_client(&record);
            supervisor
                .fetch_daemon_states(async move {
                    client.sendfd().await.map_err(|e| {
                        fsman_supervisor::SupervisorError::Io(std::io::Error::other(e.to_string()))
                    })
                })
                .await?;
        }

        Ok(())
    }

    // --- Recover protocol (§1.4.D) ---

    pub async fn recover(self: &Arc<Self>) -> Result<RecoverResult> {
        let mut result = RecoverResult { live: Vec::new(), recovering: Vec::new() };

        for record in self.registry.walk_daemons()? {
            if !self.allowed_fs_drivers.contains(&record.fs_driver) {
                debug!(daemon_id = %record.id, fs_driver = ?record.fs_driver, "recover: skipping record outside the configured fs_driver set");
                continue;
            }
            let policy = if record.supervisor_path.is_some() { RecoveryPolicy::Failover } else { self.default_recovery_policy };
            let managed = Arc::new(ManagedDaemon::new(record.clone(), policy));

            if policy.needs_supervisor() {
                self.supervisors.new_supervisor(&record.id);
            }

            let client = self.control_client(&record);
            let live = match client.daemon_info().await {
                Ok(info) if info.state.eq_ignore_ascii_case("RUNNING") => true,
                _ => false,
            };

            if live {
                managed.force_state(DaemonState::Running);
                let notifier = self.death_tx.clone();
                if let Err(e) = self.monitor.subscribe(record.id.clone(), record.api_socket.clone(), notifier) {
                    warn!(daemon_id = %record.id, error = %e, "recover: failed to subscribe live daemon to monitor");
                }
                result.live.push(record.id.clone());
            } else {
                managed.force_state(DaemonState::Unknown);
                result.recovering.push(record.id.clone());
            }

            self.cache.lock().await.insert(record.id.clone(), managed);
        }

        for instance in self.registry.walk_rafs_instances()? {
            if let Some(daemon_id) = &instance.daemon_id {
                if let Some(managed) = self.cache.lock().await.get(daemon_id) {
                    managed.attach_instance(instance.snapshot_id.clone());
                }
            }
        }

        Ok(result)
    }

    // --- Destroy-daemon protocol (§1.4.D, all steps after 1 best-effort) ---

    pub async fn destroy_daemon(self: &Arc<Self>, id: &DaemonId) -> Result<()> {
        self.registry.delete_daemon(id)?;

        let managed = self.cache.lock().await.remove(id);
        let Some(managed) = managed else { return Ok(()) };
        let record = managed.record();

        let client = self.control_client(&record);
        for instance_id in managed.instances() {
            let mountpoint = record.instance_mountpoint(instance_id.as_str());
            if let Err(e) = client.unmount(&mountpoint).await {
                warn!(daemon_id = %id, snapshot_id = %instance_id, error = %e, "destroy_daemon: unmount failed");
            }
        }

        if let Err(e) = self.monitor.unsubscribe(id) {
            debug!(daemon_id = %id, error = %e, "destroy_daemon: unsubscribe (already gone)");
        }

        if record.supervisor_path.is_some() {
            if let Err(e) = self.supervisors.destroy_supervisor(id) {
                debug!(daemon_id = %id, error = %e, "destroy_daemon: destroy_supervisor (already gone)");
            }
        }

        if let Some(pid) = managed.process_id() {
            if let Err(e) = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), nix::sys::signal::Signal::SIGTERM) {
                if e != nix::errno::Errno::ESRCH {
                    warn!(daemon_id = %id, error = %e, "destroy_daemon: SIGTERM failed");
                }
            }
        }

        managed.force_state(DaemonState::Destroyed);

        for dir in [&record.config_dir, &record.log_dir] {
            let _ = std::fs::remove_dir_all(dir);
        }
        if record.daemon_mode == DaemonMode::Dedicated {
            if let Some(parent) = record.api_socket.parent() {
                let _ = std::fs::remove_dir_all(parent);
            }
        }

        Ok(())
    }

    // --- Death-event handling / recovery policies (§1.4.D) ---

    /// Takes ownership of the death-event receiver and runs the
    /// event-handling loop until the channel is closed. Call once.
    pub async fn run_death_loop(self: &Arc<Self>) {
        let mut rx = match self.death_rx.lock().await.take() {
            Some(rx) => rx,
            None => {
                error!("run_death_loop called more than once");
                return;
            }
        };

        while let Some(event) = rx.recv().await {
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.handle_death(event).await {
                    error!(error = %e, "death-event handling failed");
                }
            });
        }
    }

    async fn handle_death(self: Arc<Self>, event: DeathEvent) -> Result<()> {
        let managed = match self.cache.lock().await.get(&event.daemon_id).cloned() {
            Some(m) => m,
            None => return Ok(()), // already destroyed
        };
        managed.force_state(DaemonState::Died);
        info!(daemon_id = %event.daemon_id, "daemon died");

        match managed.recovery_policy() {
            RecoveryPolicy::None => {
                info!(daemon_id = %event.daemon_id, "recovery policy is none, leaving daemon dead");
                Ok(())
            }
            RecoveryPolicy::Restart => self.cold_restart(&event.daemon_id).await,
            RecoveryPolicy::Failover => self.warm_failover(&event.daemon_id).await,
        }
    }

    async fn cold_restart(self: &Arc<Self>, id: &DaemonId) -> Result<()> {
        let managed = self.get_managed(id).await?;
        let record = managed.record();
        let _ = self.monitor.unsubscribe(id);
        let _ = std::fs::remove_file(&record.api_socket);

        self.start_daemon(id, false).await?;
        wait_for_local_state(&managed, DaemonState::Running, WAIT_STATE_TIMEOUT).await?;

        let mut instances = self.registry.walk_rafs_instances()?;
        instances.retain(|i| i.daemon_id.as_ref() == Some(id));
        instances.sort_by_key(|i| i.seq);
        for instance in instances {
            // A dedicated-mode daemon's own mountpoint is already mounted by
            // the start-daemon protocol; re-issuing mount against it here
            // would hit the same mountpoint the daemon just bootstrapped.
            if record.instance_mountpoint(instance.snapshot_id.as_str()) == record.mountpoint {
                continue;
            }
            if let Err(e) = self.mount_instance(&instance, "{}").await {
                warn!(daemon_id = %id, snapshot_id = %instance.snapshot_id, error = %e, "cold_restart: re-mount failed");
            }
        }
        Ok(())
    }

    async fn warm_failover(self: &Arc<Self>, id: &DaemonId) -> Result<()> {
        let _ = self.monitor.unsubscribe(id);
        let supervisor = self.supervisors.get_supervisor(id)?;

        self.start_daemon(id, false).await?;
        let managed = self.get_managed(id).await?;
        wait_for_local_state(&managed, DaemonState::Init, WAIT_STATE_TIMEOUT).await?;

        let record = managed.record();
        let client = self.control_client(&record);
        let takeover = client.takeover();
        let send = supervisor.send_states_timeout(SUPERVISOR_FETCH_TIMEOUT);
        let (takeover_res, send_res) = tokio::join!(takeover, send);
        takeover_res?;
        send_res?;

        Ok(())
    }

    // --- Live-upgrade protocol (§1.4.D) ---

    pub async fn live_upgrade(self: &Arc<Self>, id: &DaemonId) -> Result<DaemonId> {
        let managed = self.get_managed(id).await?;
        let old_record = managed.record();

        let new_id = DaemonId::new(format!("{id}-upgrade"));
        let mut new_record = old_record.clone();
        new_record.id = new_id.clone();
        new_record.api_socket = next_api_socket_path(&old_record.api_socket);

        if let Some(supervisor_path) = &old_record.supervisor_path {
            new_record.supervisor_path = Some(supervisor_path.clone());
            let supervisor = self.supervisors.get_supervisor(id)?;
            supervisor.send_states_timeout(SUPERVISOR_FETCH_TIMEOUT).await?;
        }

        self.add_daemon(new_record.clone()).await?;
        self.start_daemon(&new_id, true).await?;
        let new_managed = self.get_managed(&new_id).await?;
        wait_for_local_state(&new_managed, DaemonState::Init, WAIT_STATE_TIMEOUT).await?;

        let new_client = self.control_client(&new_record);
        new_client.takeover().await?;
        wait_for_local_state(&new_managed, DaemonState::Ready, WAIT_STATE_TIMEOUT).await?;

        let _ = self.monitor.unsubscribe(id);
        let old_client = self.control_client(&old_record);
        old_client.exit().await?;

        new_client.start().await?;
        let notifier = self.death_tx.clone();
        self.monitor.subscribe(new_id.clone(), new_record.api_socket.clone(), notifier)?;
        wait_for_local_state(&new_managed, DaemonState::Running, WAIT_STATE_TIMEOUT).await?;

        for instance_id in managed.instances() {
            new_managed.attach_instance(instance_id.clone());
        }

        self.registry.delete_daemon(id)?;
        self.cache.lock().await.remove(id);

        Ok(new_id)
    }
}

fn wait_for_socket(path: &std::path::Path, timeout: Duration, child: &mut Child, id: &DaemonId) -> Result<()> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if path.exists() {
            return Ok(());
        }
        if let Ok(Some(_status)) = child.try_wait() {
            return Err(ManagerError::SocketWaitTimedOut(id.clone()));
        }
        if std::time::Instant::now() >= deadline {
            return Err(ManagerError::SocketWaitTimedOut(id.clone()));
        }
        std::thread::sleep(WAIT_SOCKET_POLL);
    }
}

async fn wait_for_state(
    client: &ControlClient,
    id: &DaemonId,
    target: DaemonState,
    timeout: Duration,
    poll: Duration,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(info) = client.daemon_info().await {
            if info.state.eq_ignore_ascii_case(&target.to_string()) {
                return Ok(());
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ManagerError::StateWaitTimedOut(id.clone(), target));
        }
        tokio::time::sleep(poll).await;
    }
}

async fn wait_for_local_state(managed: &ManagedDaemon, target: DaemonState, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if managed.state() == target {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ManagerError::StateWaitTimedOut(managed.id.clone(), target));
        }
        tokio::time::sleep(WAIT_STATE_POLL).await;
    }
}

/// Live-upgrade's new API socket path: increment the old basename's numeric
/// suffix, or start at "api1.sock" if it has none (§1.4.D).
fn next_api_socket_path(old: &std::path::Path) -> PathBuf {
    let parent = old.parent().unwrap_or_else(|| std::path::Path::new(""));
    let stem = old.file_stem().and_then(|s| s.to_str()).unwrap_or("api");
    let ext = old.extension().and_then(|s| s.to_str()).unwrap_or("sock");

    let digits_at = stem.rfind(|c: char| !c.is_ascii_digit()).map(|i| i + 1).unwrap_or(0);
    let (base, suffix) = stem.split_at(digits_at);
    let next = suffix.parse::<u64>().map(|n| n + 1).unwrap_or(1);
    parent.join(format!("{base}{next}.{ext}"))
}
