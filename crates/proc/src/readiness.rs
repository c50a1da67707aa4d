// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Readiness probing for freshly launched backends.
//!
//! HTTP mode polls the configured method/path until a response status lands
//! in [200, 400); unix upstreams are dialed through the socket path with a
//! synthetic host. When no HTTP probe is configured, a unix upstream is
//! polled for socket existence instead.

use rbin_core::{LaunchPlan, Upstream};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Total readiness deadline for one cold start.
pub const READY_DEADLINE: Duration = Duration::from_secs(10);

/// Cadence of HTTP readiness requests.
const HTTP_PROBE_INTERVAL: Duration = Duration::from_millis(200);
/// Per-request timeout for one HTTP readiness request.
const HTTP_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
/// Cadence of socket-existence checks.
const SOCKET_PROBE_INTERVAL: Duration = Duration::from_millis(50);

/// How one readiness request reaches the backend.
#[derive(Debug, Clone)]
pub enum Dial {
    Tcp { host_port: String },
    Unix { path: PathBuf },
}

/// The readiness probe for one launch plan.
#[derive(Debug, Clone)]
pub enum Probe {
    /// Poll `method path` over the upstream transport.
    Http { dial: Dial, method: String, path: String },
    /// Poll for the socket file to appear.
    SocketExists { path: PathBuf },
}

/// How a probe ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ready,
    Cancelled,
}

impl Probe {
    /// Build the probe for a launch plan. TCP plans without an HTTP probe
    /// are rejected before launch, so every plan that reaches this point
    /// maps to a probe.
    pub fn for_plan(plan: &LaunchPlan) -> Probe {
        if plan.readiness_method.is_empty() {
            let path = plan.upstream.socket_path().map(Path::to_path_buf).unwrap_or_default();
            return Probe::SocketExists { path };
        }
        let dial = match &plan.upstream {
            Upstream::Tcp { host_port } => Dial::Tcp { host_port: host_port.clone() },
            Upstream::Unix { path } => Dial::Unix { path: path.clone() },
        };
        Probe::Http {
            dial,
            method: plan.readiness_method.clone(),
            path: plan.probe_path().to_string(),
        }
    }

    /// Poll until the backend is ready or the supervisor is cancelled. The
    /// caller bounds the wait with its own deadline.
    pub async fn wait_until_ready(&self, cancel: &CancellationToken) -> ProbeOutcome {
        match self {
            Probe::Http { dial, method, path } => {
                let mut tick = tokio::time::interval(HTTP_PROBE_INTERVAL);
                tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = tick.tick() => {
                            if http_probe_once(dial, method, path).await {
                                return ProbeOutcome::Ready;
                            }
                        }
                        _ = cancel.cancelled() => return ProbeOutcome::Cancelled,
                    }
                }
            }
            Probe::SocketExists { path } => {
                let mut tick = tokio::time::interval(SOCKET_PROBE_INTERVAL);
                tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = tick.tick() => {
                            if socket_file_ready(path) {
                                return ProbeOutcome::Ready;
                            }
                        }
                        _ = cancel.cancelled() => return ProbeOutcome::Cancelled,
                    }
                }
            }
        }
    }
}

/// One HTTP readiness request. Any transport or protocol failure counts as
/// not ready.
async fn http_probe_once(dial: &Dial, method: &str, path: &str) -> bool {
    match tokio::time::timeout(HTTP_PROBE_TIMEOUT, http_status(dial, method, path)).await {
        Ok(Ok(status)) => (200..400).contains(&status),
        _ => false,
    }
}

/// Minimal HTTP/1.1 exchange over the probe transport, returning the
/// response status code. The body is drained before the connection drops.
async fn http_status(dial: &Dial, method: &str, path: &str) -> std::io::Result<u16> {
    let host = match dial {
        Dial::Tcp { host_port } => host_port.as_str(),
        // Synthetic host; unix backends don't route on it.
        Dial::Unix { .. } => "localhost",
    };
    let request = format!("{method} {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    let mut response = Vec::new();
    match dial {
        Dial::Tcp { host_port } => {
            let mut stream = tokio::net::TcpStream::connect(host_port).await?;
            stream.write_all(request.as_bytes()).await?;
            stream.read_to_end(&mut response).await?;
        }
        #[cfg(unix)]
        Dial::Unix { path } => {
            let mut stream = tokio::net::UnixStream::connect(path).await?;
            stream.write_all(request.as_bytes()).await?;
            stream.read_to_end(&mut response).await?;
        }
        #[cfg(not(unix))]
        Dial::Unix { .. } => {
            return Err(std::io::Error::other("unix sockets unsupported on this platform"));
        }
    }
    parse_status(&response).ok_or_else(|| std::io::Error::other("malformed probe response"))
}

/// Pull the status code out of an HTTP/1.x status line.
fn parse_status(response: &[u8]) -> Option<u16> {
    let line = response.split(|&b| b == b'\n').next()?;
    let line = std::str::from_utf8(line).ok()?;
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Whether the filesystem entry at `path` exists and is a socket.
pub fn socket_file_ready(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        std::fs::metadata(path).map(|meta| meta.file_type().is_socket()).unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.exists()
    }
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod tests;
