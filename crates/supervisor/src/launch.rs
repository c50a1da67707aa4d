// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend cold start.
//!
//! The launch contract is atomic: on success the slot records a live child
//! that has passed its readiness gate; on any failure the slot's recorded
//! child and plan are untouched and anything spawned has been terminated.
//! The caller holds the slot's state lock for the whole sequence, so
//! same-key requests serialize through the cold start.

use crate::error::SupervisorError;
use crate::slot::{Backend, Slot, SlotState};
use rbin_core::{env, DetectorOverrides, HandlerConfig, LaunchPlan};
use rbin_proc::readiness::{Probe, ProbeOutcome, READY_DEADLINE};
use rbin_proc::{child, detector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Deadlines for one cold start.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Wall-clock deadline for one detector run.
    pub detector: Duration,
    /// Total readiness deadline, covering every probe attempt.
    pub readiness: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts { detector: detector::DETECTOR_DEADLINE, readiness: READY_DEADLINE }
    }
}

pub(crate) async fn cold_start(
    slot: &Arc<Slot>,
    state: &mut SlotState,
    config: &HandlerConfig,
    key: &str,
    timeouts: &Timeouts,
    cancel: &CancellationToken,
) -> Result<(), SupervisorError> {
    // Effective launch parameters: detector overrides merged onto defaults.
    let overrides = if config.is_dynamic() {
        detector::run(key, timeouts.detector).await?
    } else {
        DetectorOverrides::default()
    };
    let plan = LaunchPlan::assemble(config, &overrides)?;

    // A stale socket from an earlier life of this backend would fool the
    // readiness probe and block the child's bind.
    if let Some(path) = plan.upstream.socket_path() {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SupervisorError::Io { path: path.to_path_buf(), source });
            }
        }
    }

    let program = plan.executable.first().cloned().unwrap_or_default();
    let environment = env::child_env(config.pass_all, &config.pass_envs, &plan.envs);
    let spawned = child::spawn(&plan, environment).map_err(|source| {
        SupervisorError::LaunchFailed { program: program.clone(), source }
    })?;
    let pid = spawned.pid;
    let mut backend = spawned.child;
    tracing::info!(pid, argv = ?plan.executable, key, "backend started");

    state.starts += 1;
    let generation = state.starts;

    let drains = match (backend.stdout.take(), backend.stderr.take()) {
        (Some(out), Some(err)) => Some(child::drain_lines(pid, out, err)),
        _ => None,
    };

    // Exit watcher: the authoritative finalizer for this activation. It
    // signals the readiness race before taking the slot lock, because this
    // function holds that lock until the launch resolves. The child lives
    // under the handler's cancellation scope; a cancelled scope terminates
    // the process group.
    let (exit_tx, mut exit_rx) = oneshot::channel();
    let watcher_slot = Arc::clone(slot);
    let watcher_cancel = cancel.clone();
    tokio::spawn(async move {
        let status = tokio::select! {
            status = backend.wait() => status,
            _ = watcher_cancel.cancelled() => {
                child::kill_group(pid);
                backend.wait().await
            }
        };
        let _ = exit_tx.send(());
        if let Some((out, err)) = drains {
            let _ = out.await;
            let _ = err.await;
        }
        let mut state = watcher_slot.state.lock().await;
        if state.child.as_ref().is_some_and(|c| c.generation == generation) {
            state.child = None;
            let reason = state.termination_reason.take().unwrap_or("unexpected exit");
            match status {
                Ok(exit) => {
                    tracing::info!(pid, reason, %exit, key = %watcher_slot.key, "backend exited");
                }
                Err(err) => {
                    tracing::warn!(pid, reason, %err, key = %watcher_slot.key, "backend exit status unknown");
                }
            }
        } else {
            // Never installed (failed launch) or already replaced.
            tracing::debug!(pid, key = %watcher_slot.key, "stale backend exited");
        }
    });

    // Readiness gate, raced against the exit watcher and the deadline so an
    // early child exit cannot stall the request for the full timeout.
    let probe = Probe::for_plan(&plan);
    tracing::debug!(pid, key, "waiting for backend readiness");
    tokio::select! {
        outcome = probe.wait_until_ready(cancel) => match outcome {
            ProbeOutcome::Ready => {}
            ProbeOutcome::Cancelled => {
                child::kill_group(pid);
                return Err(SupervisorError::ReadinessTimeout {
                    program,
                    deadline: timeouts.readiness,
                });
            }
        },
        _ = &mut exit_rx => {
            return Err(SupervisorError::BackendExitedDuringReadiness { program });
        }
        _ = tokio::time::sleep(timeouts.readiness) => {
            child::kill_group(pid);
            return Err(SupervisorError::ReadinessTimeout { program, deadline: timeouts.readiness });
        }
    }

    tracing::info!(pid, key, upstream = %plan.upstream.dial_addr(), "backend ready");
    state.child = Some(Backend { pid, generation });
    state.plan = Some(plan);
    Ok(())
}
