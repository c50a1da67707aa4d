// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream address classification.
//!
//! A configured upstream descriptor takes one of two forms: a TCP address
//! (`[scheme://][host]:port`) or a filesystem socket (`unix/<path>`).
//! Classification happens once per resolution; the dial form handed to the
//! proxy engine keeps the `unix/` prefix so the dial subsystem can tell the
//! two apart.

use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Literal prefix marking a filesystem-socket upstream.
pub const UNIX_PREFIX: &str = "unix/";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream {raw:?} is not a valid address: {source}")]
    Unparseable {
        raw: String,
        #[source]
        source: url::ParseError,
    },

    #[error("upstream {raw:?} has no host")]
    MissingHost { raw: String },

    #[error("upstream {raw:?} has no port")]
    MissingPort { raw: String },

    #[error("unix socket path {path:?} is not absolute")]
    SocketPathNotAbsolute { path: PathBuf },
}

/// A classified upstream address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream {
    /// TCP upstream, dialed as `host:port`.
    Tcp { host_port: String },
    /// Unix-domain-socket upstream, dialed through the socket at `path`.
    Unix { path: PathBuf },
}

impl Upstream {
    /// Classify a raw upstream descriptor.
    ///
    /// A leading `:` gets the loopback host; a missing scheme defaults to
    /// `http://`. TCP descriptors are URL-parsed and reduced to their
    /// `host:port` component, with the port defaulted by scheme.
    pub fn parse(raw: &str) -> Result<Self, UpstreamError> {
        if let Some(path) = raw.strip_prefix(UNIX_PREFIX) {
            let path = PathBuf::from(path);
            if !path.is_absolute() {
                return Err(UpstreamError::SocketPathNotAbsolute { path });
            }
            return Ok(Upstream::Unix { path });
        }

        let mut addr = raw.to_string();
        if addr.starts_with(':') {
            addr = format!("127.0.0.1{addr}");
        }
        if !addr.starts_with("http://") && !addr.starts_with("https://") {
            addr = format!("http://{addr}");
        }
        let parsed = Url::parse(&addr)
            .map_err(|source| UpstreamError::Unparseable { raw: raw.to_string(), source })?;
        let host = parsed
            .host()
            .ok_or_else(|| UpstreamError::MissingHost { raw: raw.to_string() })?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| UpstreamError::MissingPort { raw: raw.to_string() })?;
        Ok(Upstream::Tcp { host_port: format!("{host}:{port}") })
    }

    /// The address handed to the proxy engine: `host:port` for TCP,
    /// `unix/<path>` for filesystem sockets.
    pub fn dial_addr(&self) -> String {
        match self {
            Upstream::Tcp { host_port } => host_port.clone(),
            Upstream::Unix { path } => format!("{UNIX_PREFIX}{}", path.display()),
        }
    }

    pub fn is_unix(&self) -> bool {
        matches!(self, Upstream::Unix { .. })
    }

    /// The socket path of a unix upstream.
    pub fn socket_path(&self) -> Option<&Path> {
        match self {
            Upstream::Unix { path } => Some(path),
            Upstream::Tcp { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "upstream_tests.rs"]
mod tests;
