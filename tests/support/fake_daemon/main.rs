// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fsman-fake-daemon`: a stand-in FS daemon process for the root
//! integration suite. Speaks just enough of the control API (§1.6) to drive
//! a real [`fsman_manager::Manager`] through its start/mount/recover/
//! failover/upgrade protocol against a real Unix socket and a real child
//! process, without requiring an actual `nydusd` binary in the test
//! environment.
//!
//! Not built or shipped as part of `fsmand` — lives in the root test
//! harness package purely so `CARGO_BIN_EXE_fsman-fake-daemon` resolves
//! for `tests/specs.rs` (§2.4).

use fsman_supervisor::{recv_blob_and_fd, send_blob_and_fd};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::service_fn;
use hyper::{Body, Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::UnixListener;

struct State {
    id: String,
    running: AtomicBool,
    // insertion order, not a set: the cold-restart scenario asserts RAFS
    // instances are re-mounted in ascending `seq` order (§1.4.D).
    mounts: Mutex<Vec<String>>,
    received_blob: Mutex<Option<Vec<u8>>>,
    received_fd_bytes: Mutex<Option<Vec<u8>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(apisock) = arg_value(&args, "--apisock") else {
        eprintln!("fsman-fake-daemon: --apisock is required");
        std::process::exit(2);
    };
    let id = arg_value(&args, "--id").unwrap_or_default();
    let supervisor_path = arg_value(&args, "--supervisor").map(PathBuf::from);
    let marker_file = std::env::var("FSMAN_TEST_MARKER_FILE").ok().map(PathBuf::from);

    let _ = std::fs::remove_file(&apisock);
    let listener = match UnixListener::bind(&apisock) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("fsman-fake-daemon: failed to bind {apisock}: {e}");
            std::process::exit(1);
        }
    };

    let state = Arc::new(State {
        id,
        running: AtomicBool::new(false),
        mounts: Mutex::new(Vec::new()),
        received_blob: Mutex::new(None),
        received_fd_bytes: Mutex::new(None),
    });

    loop {
        let (stream, _addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(_) => continue,
        };
        let state = state.clone();
        let supervisor_path = supervisor_path.clone();
        let marker_file = marker_file.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                handle(req, state.clone(), supervisor_path.clone(), marker_file.clone())
            });
            let _ = hyper::server::conn::Http::new().serve_connection(stream, service).await;
        });
    }
}

async fn handle(
    req: Request<Body>,
    state: Arc<State>,
    supervisor_path: Option<PathBuf>,
    marker_file: Option<PathBuf>,
) -> Result<Response<Body>, Infallible> {
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    let method = req.method().clone();

    let resp = match (&method, path.as_str()) {
        (&Method::GET, "/api/v1/daemon") => {
            let running = state.running.load(Ordering::SeqCst);
            let body = serde_json::json!({
                "id": state.id,
                "version": "fake-daemon-1.0.0",
                "state": if running { "RUNNING" } else { "INIT" },
            });
            json_response(StatusCode::OK, &body)
        }
        (&Method::GET, "/fsman-test/received-marker") => {
            let blob = lock(&state.received_blob).clone();
            let fd_bytes = lock(&state.received_fd_bytes).clone();
            let body = serde_json::json!({
                "blob": blob.map(|m| String::from_utf8_lossy(&m).into_owned()),
                "fd_bytes": fd_bytes.map(|m| String::from_utf8_lossy(&m).into_owned()),
            });
            json_response(StatusCode::OK, &body)
        }
        (&Method::GET, "/fsman-test/mounts") => {
            let mounts = lock(&state.mounts).clone();
            json_response(StatusCode::OK, &serde_json::json!({ "mounts": mounts }))
        }
        (&Method::POST, "/api/v1/mount") => {
            let mountpoint = query_param(&query, "mountpoint").unwrap_or_default();
            let mut mounts = lock(&state.mounts);
            if mounts.iter().any(|m| m == &mountpoint) {
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &serde_json::json!({ "code": "AlreadyMounted", "message": "already mounted" }),
                )
            } else {
                mounts.push(mountpoint);
                empty_response(StatusCode::OK)
            }
        }
        (&Method::DELETE, "/api/v1/mount") => {
            let mountpoint = query_param(&query, "mountpoint").unwrap_or_default();
            lock(&state.mounts).retain(|m| m != &mountpoint);
            empty_response(StatusCode::OK)
        }
        (&Method::PUT, "/api/v1/daemon/start") => {
            state.running.store(true, Ordering::SeqCst);
            empty_response(StatusCode::OK)
        }
        (&Method::PUT, "/api/v1/daemon/fuse/takeover") => {
            // The real daemon pulls its predecessor's handed-off state from
            // the supervisor as part of handling takeover, racing the
            // manager's own `send_states_timeout` trigger (§1.4.D
            // warm-failover / live-upgrade protocols share this step).
            if let Some(path) = supervisor_path {
                receive_marker_fd(&path, &state);
            }
            state.running.store(true, Ordering::SeqCst);
            empty_response(StatusCode::OK)
        }
        (&Method::PUT, "/api/v1/daemon/fuse/sendfd") => {
            if let Some(path) = supervisor_path {
                send_marker_fd(&path, &state.id, marker_file);
            }
            empty_response(StatusCode::OK)
        }
        (&Method::PUT, "/api/v1/daemon/exit") => {
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                std::process::exit(0);
            });
            empty_response(StatusCode::OK)
        }
        _ => empty_response(StatusCode::NOT_FOUND),
    };

    Ok(resp)
}

/// Opens `marker_file` (if set) and hands its FD to the supervisor at
/// `path` alongside the daemon's own id as the state blob, mirroring
/// `Supervisor::fetch_daemon_states`'s expectation that the daemon connects
/// and sends exactly once per trigger.
fn send_marker_fd(path: &PathBuf, id: &str, marker_file: Option<PathBuf>) {
    let file = marker_file.and_then(|p| std::fs::File::open(p).ok());
    let raw_fd: Option<RawFd> = file.as_ref().map(|f| f.as_raw_fd());
    if let Ok(stream) = StdUnixStream::connect(path) {
        let _ = send_blob_and_fd(&stream, id.as_bytes(), raw_fd);
    }
    // `file` (and the fd duped into the message) is closed here; the peer
    // keeps its own copy from the SCM_RIGHTS control message.
}

/// Connects to the supervisor at `path` and receives the blob + FD it
/// handed off on a prior `sendfd`, storing both for test inspection via
/// `/fsman-test/received-marker`. Reads the FD's contents directly (rather
/// than just asserting the blob round-tripped) so the end-to-end suite can
/// verify FD identity by comparing recovered bytes against the marker file
/// the predecessor was given.
fn receive_marker_fd(path: &PathBuf, state: &State) {
    // The manager's `send_states_timeout` binds its listener concurrently
    // with this call rather than before it, so the socket may not exist
    // yet on the first attempt (mirrors the retry-with-backoff style in
    // the liveness monitor's own `subscribe`).
    let mut stream = None;
    for _ in 0..50 {
        if let Ok(s) = StdUnixStream::connect(path) {
            stream = Some(s);
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(20));
    }
    let Some(stream) = stream else { return };
    let Ok((blob, fd)) = recv_blob_and_fd(&stream) else { return };
    *lock(&state.received_blob) = Some(blob);

    if let Some(fd) = fd {
        let mut buf = [0u8; 256];
        let bytes = match nix::unistd::read(fd, &mut buf) {
            Ok(n) => Some(buf[..n].to_vec()),
            Err(_) => None,
        };
        *lock(&state.received_fd_bytes) = bytes;
        let _ = nix::unistd::close(fd);
    }
}

/// Minimal `key=value&...` query parsing; control-socket paths never
/// contain characters that need percent-decoding in this test harness.
fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.to_string())
    })
}

fn empty_response(status: StatusCode) -> Response<Body> {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = status;
    resp
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Body> {
    let mut resp = Response::new(Body::from(body.to_string()));
    *resp.status_mut() = status;
    resp.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}
