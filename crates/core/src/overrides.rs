// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detector output contract and launch-parameter merging.
//!
//! The detector's standard output is a JSON object whose fields each
//! override the corresponding configured default when present. Merging
//! produces the effective [`LaunchPlan`] for one cold start.

use crate::config::HandlerConfig;
use crate::upstream::{Upstream, UpstreamError};
use serde::Deserialize;
use thiserror::Error;

/// Optional per-request overrides produced by the detector. Every field is
/// nullable; an absent or null field leaves the configured default in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DetectorOverrides {
    pub executable: Option<Vec<String>>,
    pub working_directory: Option<String>,
    pub envs: Option<Vec<String>>,
    pub reverse_proxy_to: Option<String>,
    pub readiness_method: Option<String>,
    pub readiness_path: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("no executable configured and the detector supplied none")]
    MissingExecutable,

    #[error("no upstream configured and the detector supplied none")]
    MissingUpstream,

    #[error("tcp upstream {addr:?} requires a readiness method and path")]
    ReadinessRequired { addr: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Effective launch parameters for one backend activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub executable: Vec<String>,
    pub working_dir: String,
    pub envs: Vec<String>,
    pub upstream: Upstream,
    pub readiness_method: String,
    pub readiness_path: String,
}

impl LaunchPlan {
    /// Merge detector overrides onto configured defaults and validate the
    /// result. A TCP upstream without a readiness probe is rejected here on
    /// every launch attempt, since the detector can override either side.
    pub fn assemble(
        config: &HandlerConfig,
        overrides: &DetectorOverrides,
    ) -> Result<Self, PlanError> {
        let executable =
            overrides.executable.clone().unwrap_or_else(|| config.executable.clone());
        if executable.is_empty() {
            return Err(PlanError::MissingExecutable);
        }

        let mut working_dir = overrides
            .working_directory
            .clone()
            .unwrap_or_else(|| config.working_dir.clone());
        if working_dir.is_empty() {
            working_dir = ".".to_string();
        }

        let envs = overrides.envs.clone().unwrap_or_else(|| config.envs.clone());

        let raw_upstream =
            overrides.reverse_proxy_to.clone().unwrap_or_else(|| config.upstream.clone());
        if raw_upstream.is_empty() {
            return Err(PlanError::MissingUpstream);
        }
        let upstream = Upstream::parse(&raw_upstream)?;

        let readiness_method = overrides
            .readiness_method
            .as_deref()
            .unwrap_or(&config.readiness_method)
            .trim()
            .to_uppercase();
        let readiness_path =
            overrides.readiness_path.clone().unwrap_or_else(|| config.readiness_path.clone());

        if !upstream.is_unix() && readiness_method.is_empty() {
            return Err(PlanError::ReadinessRequired { addr: raw_upstream });
        }

        Ok(LaunchPlan { executable, working_dir, envs, upstream, readiness_method, readiness_path })
    }

    /// Path the HTTP readiness probe requests; defaults to `/`.
    pub fn probe_path(&self) -> &str {
        if self.readiness_path.is_empty() {
            "/"
        } else {
            &self.readiness_path
        }
    }
}

#[cfg(test)]
#[path = "overrides_tests.rs"]
mod tests;
