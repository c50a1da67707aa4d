// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Middleware error kinds.
//!
//! Every launch-path failure surfaces to the proxy engine as one of these;
//! the host renders them as 5xx. Failures are fatal to the request, never
//! to the handler: the next request re-enters the state machine from Idle.

use rbin_core::{PlanError, UpstreamError};
use rbin_proc::detector::DetectorError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    InvalidUpstream(#[from] UpstreamError),

    #[error("invalid launch parameters: {0}")]
    InvalidConfig(String),

    #[error("detector {program:?} did not finish within {deadline:?}")]
    DetectorTimeout { program: String, deadline: Duration },

    #[error("detector {program:?} exited with {status}: {stdout}")]
    DetectorFailed { program: String, status: String, stdout: String },

    #[error("detector {program:?} produced invalid overrides: {message}")]
    DetectorBadOutput { program: String, message: String },

    #[error("socket cleanup for {path:?} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backend {program:?} could not be spawned: {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("backend {program:?} exited before becoming ready")]
    BackendExitedDuringReadiness { program: String },

    #[error("backend {program:?} was not ready within {deadline:?}")]
    ReadinessTimeout { program: String, deadline: Duration },

    #[error("upstream socket {path:?} is missing or not a socket")]
    SocketNotReady { path: PathBuf },
}

impl From<PlanError> for SupervisorError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Upstream(e) => SupervisorError::InvalidUpstream(e),
            other => SupervisorError::InvalidConfig(other.to_string()),
        }
    }
}

impl From<DetectorError> for SupervisorError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Timeout { program, deadline } => {
                SupervisorError::DetectorTimeout { program, deadline }
            }
            DetectorError::Failed { program, status, stdout } => {
                SupervisorError::DetectorFailed { program, status, stdout }
            }
            DetectorError::BadOutput { program, source } => {
                SupervisorError::DetectorBadOutput { program, message: source.to_string() }
            }
            // An unspawnable detector is a detector failure, not a backend
            // launch failure.
            DetectorError::Spawn { program, source } => SupervisorError::DetectorFailed {
                program,
                status: source.to_string(),
                stdout: String::new(),
            },
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
