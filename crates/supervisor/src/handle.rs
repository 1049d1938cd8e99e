// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`Supervisor`]: per-daemon state custodian (§1.4.B).

use crate::error::Result;
use crate::transfer::{recv_blob_and_fd, send_blob_and_fd};
use fsman_core::DaemonId;
use parking_lot::Mutex;
use std::future::Future;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixListener;
use tokio::sync::Semaphore;
use tracing::warn;

#[derive(Default)]
struct StoredState {
    blob: Vec<u8>,
    fd: Option<RawFd>,
}

/// Holds the last state blob (and at most one FD) a daemon has handed off
/// for failover, and brokers the two sides of that handoff over its own
/// Unix socket.
pub struct Supervisor {
    pub id: DaemonId,
    socket_path: PathBuf,
    stored: Mutex<StoredState>,
    /// Capacity-1: at most one `fetch_daemon_states` round trip at a time.
    fetch_lock: Semaphore,
}

impl Supervisor {
    pub fn new(id: DaemonId, socket_path: PathBuf) -> Self {
        Self { id, socket_path, stored: Mutex::new(StoredState::default()), fetch_lock: Semaphore::new(1) }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Binds the supervisor socket, runs `trigger` (expected to ask the
    /// daemon to connect and send its state), then blocks until one
    /// connection delivers a blob and at most one FD. Returns only after
    /// both the trigger and the receive have completed.
    pub async fn fetch_daemon_states<Fut>(&self, trigger: Fut) -> Result<()>
    where
        Fut: Future<Output = Result<()>>,
    {
        let _permit = self.fetch_lock.acquire().await.expect("fetch semaphore is never closed");

        let _ = tokio::fs::remove_file(&self.socket_path).await;
        let listener = UnixListener::bind(&self.socket_path)?;

        trigger.await?;

        let (stream, _addr) = listener.accept().await?;
        let std_stream = stream.into_std().map_err(crate::error::SupervisorError::Io)?;
        let (blob, fd) =
            tokio::task::spawn_blocking(move || recv_blob_and_fd(&std_stream)).await.map_err(|_| {
                crate::error::SupervisorError::EmptyTransfer
            })??;
        drop(listener);

        self.replace_state(blob, fd);
        Ok(())
    }

    /// Binds the supervisor socket and spawns a background task that
    /// accepts one connection and sends the currently stored blob + FD.
    /// Returns as soon as the listener is ready — not once the send
    /// completes. `timeout == Duration::ZERO` waits forever for a peer;
    /// any other duration closes the listener (abandoning the send) if no
    /// peer connects in time.
    pub async fn send_states_timeout(&self, timeout: Duration) -> Result<()> {
        let (blob, fd) = {
            let guard = self.stored.lock();
            (guard.blob.clone(), guard.fd)
        };

        let _ = tokio::fs::remove_file(&self.socket_path).await;
        let listener = UnixListener::bind(&self.socket_path)?;

        tokio::spawn(async move {
            let accepted = if timeout.is_zero() {
                listener.accept().await
            } else {
                match tokio::time::timeout(timeout, listener.accept()).await {
                    Ok(res) => res,
                    Err(_) => {
                        warn!("send_states_timeout: no peer connected before deadline");
                        drop(listener);
                        return;
                    }
                }
            };

            let stream = match accepted {
                Ok((stream, _addr)) => stream,
                Err(e) => {
                    warn!(error = %e, "send_states_timeout: accept failed");
                    drop(listener);
                    return;
                }
            };

            let std_stream = match stream.into_std() {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "send_states_timeout: failed to convert stream");
                    drop(listener);
                    return;
                }
            };

            match tokio::task::spawn_blocking(move || send_blob_and_fd(&std_stream, &blob, fd)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "send_states_timeout: send failed"),
                Err(e) => warn!(error = %e, "send_states_timeout: blocking task panicked"),
            }
            drop(listener);
        });

        Ok(())
    }

    /// Closes the stored FD (if any) and removes the socket file. Called
    /// when the daemon it tracks is destroyed.
    pub fn destroy(&self) {
        let mut guard = self.stored.lock();
        if let Some(fd) = guard.fd.take() {
            let _ = nix::unistd::close(fd);
        }
        guard.blob.clear();
        let _ = std::fs::remove_file(&self.socket_path);
    }

    fn replace_state(&self, blob: Vec<u8>, fd: Option<RawFd>) {
        let mut guard = self.stored.lock();
        if let Some(old) = guard.fd.take() {
            let _ = nix::unistd::close(old);
        }
        guard.blob = blob;
        guard.fd = fd;
    }
}
