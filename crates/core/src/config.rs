// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler configuration.
//!
//! One [`HandlerConfig`] is provisioned per route block by the host's
//! configuration layer and is immutable afterwards. [`HandlerConfig::provision`]
//! normalizes and validates it before any request is served.

use crate::duration;
use crate::upstream::{Upstream, UpstreamError};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Idle period after which a backend with no in-flight requests is reaped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("an executable is required unless a detector is configured")]
    MissingExecutable,

    #[error("an upstream is required unless a detector is configured")]
    MissingUpstream,

    #[error("tcp upstream {addr:?} requires a readiness method and path")]
    ReadinessRequired { addr: String },

    #[error("idle_timeout must be positive")]
    ZeroIdleTimeout,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Immutable per-route configuration for one on-demand handler.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Command tokens for the backend: `[path, arg1, ...]`.
    pub executable: Vec<String>,
    /// Working directory for the backend; empty means `.`.
    pub working_dir: String,
    /// `KEY=VALUE` entries appended to the backend environment. Later
    /// entries win ties.
    pub envs: Vec<String>,
    /// Names of supervisor environment variables imported into the backend.
    pub pass_envs: Vec<String>,
    /// Import the whole supervisor environment before `envs` is appended.
    pub pass_all: bool,
    /// Upstream descriptor: `[scheme://][host]:port` or `unix/<path>`.
    pub upstream: String,
    /// HTTP readiness method; empty means no HTTP probe.
    pub readiness_method: String,
    /// HTTP readiness path.
    pub readiness_path: String,
    /// Detector command tokens; empty means static mode.
    pub detector: Vec<String>,
    /// Idle period before the backend is reaped.
    #[serde(deserialize_with = "duration::deserialize")]
    pub idle_timeout: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        HandlerConfig {
            executable: Vec::new(),
            working_dir: String::new(),
            envs: Vec::new(),
            pass_envs: Vec::new(),
            pass_all: false,
            upstream: String::new(),
            readiness_method: String::new(),
            readiness_path: String::new(),
            detector: Vec::new(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl HandlerConfig {
    /// Whether a detector computes launch parameters per request.
    pub fn is_dynamic(&self) -> bool {
        !self.detector.is_empty()
    }

    /// Normalize and validate a freshly provisioned configuration.
    ///
    /// The readiness method is upper-cased. Static mode requires both an
    /// executable and an upstream; a TCP upstream always requires a
    /// readiness probe.
    pub fn provision(mut self) -> Result<Self, ConfigError> {
        self.readiness_method = self.readiness_method.trim().to_uppercase();
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::ZeroIdleTimeout);
        }
        if !self.is_dynamic() {
            if self.executable.is_empty() {
                return Err(ConfigError::MissingExecutable);
            }
            if self.upstream.is_empty() {
                return Err(ConfigError::MissingUpstream);
            }
        }
        if !self.upstream.is_empty() {
            let upstream = Upstream::parse(&self.upstream)?;
            if !upstream.is_unix() && self.readiness_method.is_empty() {
                return Err(ConfigError::ReadinessRequired { addr: self.upstream.clone() });
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
