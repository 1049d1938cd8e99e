// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP-over-Unix-domain-socket client for the daemon control API (§1.6).

use crate::error::{ManagerError, Result};
use crate::wire::{DaemonErrorBody, DaemonInfo, FsBackendMountCmd};
use hyper::{Body, Client, Method, Request, StatusCode};
use hyperlocal::{UnixClientExt, Uri as UnixUri};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Control-socket HTTP client default timeout (§1.5).
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ControlClient {
    socket_path: PathBuf,
    client: Client<hyperlocal::UnixConnector>,
    timeout: Duration,
}

impl ControlClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self { socket_path: socket_path.into(), client: Client::unix(), timeout: DEFAULT_CLIENT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn uri(&self, path_and_query: &str) -> hyper::Uri {
        UnixUri::new(&self.socket_path, path_and_query).into()
    }

    async fn send(&self, req: Request<Body>) -> Result<hyper::Response<Body>> {
        tokio::time::timeout(self.timeout, self.client.request(req))
            .await
            .map_err(|_| ManagerError::Control(format!("request to {} timed out", self.socket_path.display())))?
            .map_err(|e| ManagerError::Control(e.to_string()))
    }

    async fn check_status(resp: hyper::Response<Body>) -> Result<Vec<u8>> {
        let status = resp.status();
        let body = hyper::body::to_bytes(resp.into_body())
            .await
            .map_err(|e| ManagerError::Control(e.to_string()))?;

        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            return Ok(body.to_vec());
        }

        let parsed: Option<DaemonErrorBody> = serde_json::from_slice(&body).ok();
        match parsed {
            Some(e) => Err(ManagerError::DaemonApi { code: e.code, message: e.message }),
            None => Err(ManagerError::DaemonApi { code: status.to_string(), message: String::from_utf8_lossy(&body).into_owned() }),
        }
    }

    pub async fn daemon_info(&self) -> Result<DaemonInfo> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(self.uri("/api/v1/daemon"))
            .body(Body::empty())
            .map_err(|e| ManagerError::Control(e.to_string()))?;
        let resp = self.send(req).await?;
        let body = Self::check_status(resp).await?;
        serde_json::from_slice(&body).map_err(|e| ManagerError::Control(e.to_string()))
    }

    pub async fn mount(&self, mountpoint: &Path, cmd: &FsBackendMountCmd) -> Result<()> {
        let path_and_query = format!("/api/v1/mount?mountpoint={}", mountpoint.display());
        let body = serde_json::to_vec(cmd).map_err(|e| ManagerError::Control(e.to_string()))?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.uri(&path_and_query))
            .header("content-type", "application/json")
            .body(Body::from(body))
            .map_err(|e| ManagerError::Control(e.to_string()))?;
        let resp = self.send(req).await?;
        Self::check_status(resp).await.map(|_| ())
    }

    pub async fn unmount(&self, mountpoint: &Path) -> Result<()> {
        let path_and_query = format!("/api/v1/mount?mountpoint={}", mountpoint.display());
        let req = Request::builder()
            .method(Method::DELETE)
            .uri(self.uri(&path_and_query))
            .body(Body::empty())
            .map_err(|e| ManagerError::Control(e.to_string()))?;
        let resp = self.send(req).await?;
        Self::check_status(resp).await.map(|_| ())
    }

    pub async fn start(&self) -> Result<()> {
        self.put_empty("/api/v1/daemon/start").await
    }

    pub async fn exit(&self) -> Result<()> {
        self.put_empty("/api/v1/daemon/exit").await
    }

    pub async fn takeover(&self) -> Result<()> {
        self.put_empty("/api/v1/daemon/fuse/takeover").await
    }

    pub async fn sendfd(&self) -> Result<()> {
        self.put_empty("/api/v1/daemon/fuse/sendfd").await
    }

    async fn put_empty(&self, path: &str) -> Result<()> {
        let req = Request::builder()
            .method(Method::PUT)
            .uri(self.uri(path))
            .body(Body::empty())
            .map_err(|e| ManagerError::Control(e.to_string()))?;
        let resp = self.send(req).await?;
        Self::check_status(resp).await.map(|_| ())
    }
}
