// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detector execution.
//!
//! The detector is a user-supplied program whose argv is the expanded key
//! split on single spaces. It runs in its own process group under a
//! wall-clock deadline; its standard output must be a JSON object of
//! launch-parameter overrides.

use rbin_core::DetectorOverrides;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Wall-clock deadline for one detector run.
pub const DETECTOR_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("detector {program:?} did not finish within {deadline:?}")]
    Timeout { program: String, deadline: Duration },

    #[error("detector {program:?} exited with {status}: {stdout}")]
    Failed { program: String, status: String, stdout: String },

    #[error("detector {program:?} produced invalid overrides: {source}")]
    BadOutput {
        program: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("detector {program:?} could not be run: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run the detector command line for `key` and decode its overrides.
///
/// Standard error is logged line-by-line and never ends up in the returned
/// error; a failure embeds exit status and captured standard output only.
pub async fn run(key: &str, deadline: Duration) -> Result<DetectorOverrides, DetectorError> {
    let mut argv = key.split(' ');
    let program = argv.next().unwrap_or_default().to_string();
    if program.is_empty() {
        return Err(DetectorError::Spawn {
            program,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty detector command"),
        });
    }

    let mut cmd = Command::new(&program);
    cmd.args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    crate::child::isolate(&mut cmd);

    let child = cmd
        .spawn()
        .map_err(|source| DetectorError::Spawn { program: program.clone(), source })?;
    let pid = child.id();

    let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
        Ok(done) => {
            done.map_err(|source| DetectorError::Spawn { program: program.clone(), source })?
        }
        Err(_) => {
            if let Some(pid) = pid {
                crate::child::kill_group(pid);
            }
            return Err(DetectorError::Timeout { program, deadline });
        }
    };

    for line in String::from_utf8_lossy(&output.stderr).lines() {
        tracing::warn!(detector = %program, %line, "detector stderr");
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    if !output.status.success() {
        tracing::warn!(
            detector = %program,
            status = %output.status,
            %stdout,
            "detector failed"
        );
        return Err(DetectorError::Failed {
            program,
            status: output.status.to_string(),
            stdout,
        });
    }

    serde_json::from_str(&stdout).map_err(|source| DetectorError::BadOutput { program, source })
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
