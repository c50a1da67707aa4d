// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The on-demand middleware.
//!
//! One handler instance is provisioned per route block and carries its own
//! slot registry. The proxy engine calls [`OnDemand::upstreams`] before
//! dispatch to obtain a dial address, and holds an [`ActiveRequest`] across
//! the proxy round-trip; the last request out arms the idle timer.

use crate::error::SupervisorError;
use crate::launch::{self, Timeouts};
use crate::slot::Slot;
use parking_lot::Mutex;
use rbin_core::{derive_key, ConfigError, Expander, HandlerConfig};
use rbin_proc::{child, liveness, readiness};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct OnDemand {
    config: HandlerConfig,
    timeouts: Timeouts,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
    cancel: CancellationToken,
}

impl OnDemand {
    /// Validate and normalize `config` into a live handler.
    pub fn provision(config: HandlerConfig) -> Result<Self, ConfigError> {
        Self::provision_scoped(config, &CancellationToken::new())
    }

    /// Provision under the host's cancellation scope. Cancelling the parent
    /// stops readiness waits; pair it with [`OnDemand::shutdown`] to also
    /// terminate the children.
    pub fn provision_scoped(
        config: HandlerConfig,
        parent: &CancellationToken,
    ) -> Result<Self, ConfigError> {
        let config = config.provision()?;
        Ok(OnDemand {
            config,
            timeouts: Timeouts::default(),
            slots: Mutex::new(HashMap::new()),
            cancel: parent.child_token(),
        })
    }

    /// Override the launch deadlines (specs shorten them).
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// The supervisor key for the current request: empty in static mode,
    /// the expanded detector command line otherwise.
    pub fn key(&self, expander: &dyn Expander) -> String {
        derive_key(&self.config.detector, expander)
    }

    // Registry lookup; the map lock is held only to obtain or create the
    // slot handle.
    fn slot(&self, key: &str) -> Arc<Slot> {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(key.to_string()).or_insert_with(|| Slot::new(key.to_string())))
    }

    /// Upstream selection: ensure a ready backend exists for the request's
    /// key and return its dial address (`host:port` or `unix/<path>`).
    pub async fn upstreams(&self, expander: &dyn Expander) -> Result<String, SupervisorError> {
        let key = self.key(expander);
        let slot = self.slot(&key);
        let mut state = slot.state.lock().await;

        // The exit watcher is authoritative but asynchronous; catch a dead
        // child it has not yet finalized.
        let dead_pid = match &state.child {
            Some(backend) if !liveness::is_alive(backend.pid) => Some(backend.pid),
            _ => None,
        };
        if let Some(pid) = dead_pid {
            tracing::warn!(pid, key, "backend reported dead");
            state.child = None;
            if let Some(path) = state.plan.as_ref().and_then(|p| p.upstream.socket_path()) {
                let _ = std::fs::remove_file(path);
            }
        }

        if state.child.is_none() {
            launch::cold_start(&slot, &mut state, &self.config, &key, &self.timeouts, &self.cancel)
                .await?;
        }

        slot.cancel_idle_timer();

        let Some(plan) = state.plan.as_ref() else {
            return Err(SupervisorError::InvalidConfig("launch recorded no parameters".into()));
        };
        // A child that crashed between the liveness check above and this
        // point shows up as a missing socket.
        if let Some(path) = plan.upstream.socket_path() {
            if !readiness::socket_file_ready(path) {
                return Err(SupervisorError::SocketNotReady { path: path.to_path_buf() });
            }
        }
        Ok(plan.upstream.dial_addr())
    }

    /// Request accounting around one proxy round-trip. Dropping the guard
    /// records completion; drop it on the runtime so the idle timer can be
    /// armed.
    pub fn begin(&self, expander: &dyn Expander) -> ActiveRequest {
        let key = self.key(expander);
        let slot = self.slot(&key);
        slot.acquire();
        ActiveRequest { slot, idle_timeout: self.config.idle_timeout }
    }

    /// Terminate every supervised child's process group and stop all idle
    /// timers. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let slots: Vec<Arc<Slot>> = self.slots.lock().values().cloned().collect();
        for slot in slots {
            slot.cancel_idle_timer();
            let mut state = slot.state.lock().await;
            if let Some(pid) = state.child.as_ref().map(|b| b.pid) {
                state.termination_reason = Some("shutting down");
                tracing::info!(pid, key = %slot.key, "terminating backend for shutdown");
                child::kill_group(pid);
            }
        }
    }

    /// Point-in-time view of one slot, keyed the way requests are.
    pub async fn snapshot(&self, key: &str) -> Option<SlotSnapshot> {
        let slot = {
            let slots = self.slots.lock();
            slots.get(key).cloned()
        }?;
        let state = slot.state.lock().await;
        Some(SlotSnapshot {
            pid: state.child.as_ref().map(|b| b.pid),
            starts: state.starts,
            active: slot.active(),
        })
    }
}

/// Live view of one supervision slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub pid: Option<u32>,
    pub starts: u64,
    pub active: u64,
}

/// RAII guard for one in-flight request.
pub struct ActiveRequest {
    slot: Arc<Slot>,
    idle_timeout: Duration,
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        self.slot.release(self.idle_timeout);
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
