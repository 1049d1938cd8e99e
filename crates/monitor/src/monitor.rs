// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`LivenessMonitor`]: the epoll-based daemon-death watcher (§1.4.C).

use crate::error::{MonitorError, Result};
use fsman_core::{DaemonId, DeathEvent};
use mio::net::UnixStream as MioUnixStream;
use mio::{Events, Interest, Poll, Token, Waker};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};

/// Reserved token for the wakeup registration; daemon subscriptions are
/// handed out starting at `Token(0)` and never reach this value.
const WAKER_TOKEN: Token = Token(usize::MAX);

/// Upper bound on how long `subscribe` retries connecting while a daemon is
/// still coming up (§1.4.C, §1.6 "retry budgets").
const CONNECT_BACKOFF_DEADLINE: Duration = Duration::from_millis(2_000);
const CONNECT_BACKOFF_STEP: Duration = Duration::from_millis(20);
const CONNECT_BACKOFF_MAX_STEP: Duration = Duration::from_millis(200);

struct Target {
    id: DaemonId,
    socket_path: PathBuf,
    conn: MioUnixStream,
    notifier: Sender<DeathEvent>,
}

struct Subscriptions {
    by_id: HashMap<DaemonId, Token>,
    by_token: HashMap<Token, Target>,
}

/// One dedicated OS thread blocks in [`LivenessMonitor::run`]; every other
/// method may be called from any thread and only takes short-lived locks.
pub struct LivenessMonitor {
    poll: Mutex<Poll>,
    subs: Mutex<Subscriptions>,
    next_token: AtomicUsize,
    waker: Waker,
    closed: AtomicBool,
}

impl LivenessMonitor {
    pub fn new() -> Result<Self> {
        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKER_TOKEN)?;
        Ok(Self {
            poll: Mutex::new(poll),
            subs: Mutex::new(Subscriptions { by_id: HashMap::new(), by_token: HashMap::new() }),
            next_token: AtomicUsize::new(0),
            waker,
            closed: AtomicBool::new(false),
        })
    }

    /// Connects to `socket_path` (retrying with backoff while the daemon
    /// finishes starting up) and watches it for peer hangup. Fails
    /// `ALREADY_EXISTS` if `id` already has a live subscription.
    pub fn subscribe(&self, id: DaemonId, socket_path: PathBuf, notifier: Sender<DeathEvent>) -> Result<()> {
        if self.subs.lock().by_id.contains_key(&id) {
            return Err(MonitorError::AlreadyExists(id));
        }

        let mut conn = connect_with_backoff(&socket_path)?;
        let token = Token(self.next_token.fetch_add(1, Ordering::Relaxed));

        self.poll.lock().registry().register(&mut conn, token, Interest::READABLE)?;

        let mut subs = self.subs.lock();
        subs.by_id.insert(id.clone(), token);
        subs.by_token.insert(token, Target { id, socket_path, conn, notifier });
        Ok(())
    }

    pub fn unsubscribe(&self, id: &DaemonId) -> Result<()> {
        let mut subs = self.subs.lock();
        let token = subs.by_id.remove(id).ok_or_else(|| MonitorError::NotFound(id.clone()))?;
        if let Some(mut target) = subs.by_token.remove(&token) {
            let _ = self.poll.lock().registry().deregister(&mut target.conn);
        }
        Ok(())
    }

    /// Blocking epoll-wait loop. Runs on its own dedicated thread until
    /// [`Self::destroy`] wakes it and it observes `closed`.
    pub fn run(&self) -> Result<()> {
        let mut events = Events::with_capacity(128);
        loop {
            let poll_result = self.poll.lock().poll(&mut events, None);
            match poll_result {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => return Ok(()),
            }

            for event in events.iter() {
                let token = event.token();
                if token == WAKER_TOKEN {
                    continue;
                }
                if !(event.is_read_closed() || event.is_error()) {
                    continue;
                }

                let mut subs = self.subs.lock();
                let Some(target) = subs.by_token.remove(&token) else {
                    // Already unsubscribed; ignore the spurious wakeup.
                    continue;
                };
                subs.by_id.remove(&target.id);
                drop(subs);

                debug!(daemon_id = %target.id, socket_path = ?target.socket_path, "daemon control socket hung up");
                if notifier_send(&target.notifier, DeathEvent::new(target.id.clone(), target.socket_path.clone())).is_err() {
                    warn!(daemon_id = %target.id, "death notifier channel closed or full");
                }
            }

            if self.closed.load(Ordering::Acquire) {
                return Ok(());
            }
        }
    }

    /// Unsubscribes everything and wakes a concurrently running [`Self::run`]
    /// via the registered [`Waker`], so its blocked `poll()` call returns and
    /// observes `closed`.
    pub fn destroy(&self) {
        let mut subs = self.subs.lock();
        let mut poll = self.poll.lock();
        for (_, mut target) in subs.by_token.drain() {
            let _ = poll.registry().deregister(&mut target.conn);
        }
        subs.by_id.clear();
        drop(poll);
        drop(subs);

        self.closed.store(true, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "destroy: failed to wake liveness monitor loop");
        }
    }
}

fn notifier_send(notifier: &Sender<DeathEvent>, event: DeathEvent) -> std::result::Result<(), ()> {
    notifier.try_send(event).map_err(|_| ())
}

fn connect_with_backoff(path: &Path) -> Result<MioUnixStream> {
    let deadline = Instant::now() + CONNECT_BACKOFF_DEADLINE;
    let mut backoff = CONNECT_BACKOFF_STEP;
    loop {
        match MioUnixStream::connect(path) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                if Instant::now() >= deadline {
                    return Err(MonitorError::ConnectTimedOut(e));
                }
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(CONNECT_BACKOFF_MAX_STEP);
            }
        }
    }
}
