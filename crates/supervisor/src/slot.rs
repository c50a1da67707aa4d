// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-key supervision slots.
//!
//! A slot is created on the first request for its key and never removed
//! while the handler lives; its child transitions absent → live → absent
//! across activation cycles. The async state mutex serializes cold starts,
//! so concurrent first requests for one key spawn exactly one child. The
//! accounting mutex is only ever taken to adjust the in-flight counter and
//! the idle timer, never across I/O.

use parking_lot::Mutex;
use rbin_core::LaunchPlan;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The recorded child of one activation cycle.
#[derive(Debug, Clone)]
pub(crate) struct Backend {
    pub pid: u32,
    /// Launch generation, compared by the exit watcher so a dying child
    /// never clears a replacement that is already installed.
    pub generation: u64,
}

#[derive(Default)]
pub(crate) struct SlotState {
    pub child: Option<Backend>,
    /// Effective launch parameters of the current or most recent child.
    pub plan: Option<LaunchPlan>,
    /// Cause attached to the next exit log.
    pub termination_reason: Option<&'static str>,
    /// Count of launch attempts; doubles as the generation counter.
    pub starts: u64,
}

#[derive(Default)]
struct Accounting {
    active: u64,
    /// Bumped whenever the idle timer is disarmed. A fired timer that was
    /// waiting on the state lock re-checks this before killing anything.
    epoch: u64,
    idle_timer: Option<JoinHandle<()>>,
}

pub(crate) struct Slot {
    pub key: String,
    pub state: tokio::sync::Mutex<SlotState>,
    gate: Mutex<Accounting>,
}

impl Slot {
    pub fn new(key: String) -> Arc<Self> {
        Arc::new(Slot {
            key,
            state: tokio::sync::Mutex::new(SlotState::default()),
            gate: Mutex::new(Accounting::default()),
        })
    }

    /// Note one more in-flight request and disarm the idle timer.
    pub fn acquire(&self) {
        let mut gate = self.gate.lock();
        gate.active += 1;
        disarm(&mut gate);
    }

    /// Note one request finished; the last one out arms the idle timer.
    pub fn release(self: &Arc<Self>, idle_timeout: Duration) {
        let mut gate = self.gate.lock();
        gate.active = gate.active.saturating_sub(1);
        if gate.active == 0 {
            let armed_epoch = gate.epoch;
            let slot = Arc::clone(self);
            let timer = tokio::spawn(async move {
                tokio::time::sleep(idle_timeout).await;
                slot.reap_idle(armed_epoch).await;
            });
            if let Some(stale) = gate.idle_timer.replace(timer) {
                stale.abort();
            }
        }
    }

    /// Disarm any armed idle timer. Idempotent.
    pub fn cancel_idle_timer(&self) {
        disarm(&mut self.gate.lock());
    }

    pub fn active(&self) -> u64 {
        self.gate.lock().active
    }

    /// Idle-timer body: terminate the child's process group if the slot is
    /// still idle and the timer was not disarmed while this task waited on
    /// the state lock. The exit watcher clears `child` afterwards.
    async fn reap_idle(self: Arc<Self>, armed_epoch: u64) {
        let mut state = self.state.lock().await;
        {
            let gate = self.gate.lock();
            if gate.active > 0 || gate.epoch != armed_epoch {
                return;
            }
        }
        if let Some(pid) = state.child.as_ref().map(|b| b.pid) {
            state.termination_reason = Some("idle timeout");
            tracing::info!(pid, key = %self.key, "backend idle, terminating");
            rbin_proc::child::kill_group(pid);
        }
    }
}

fn disarm(gate: &mut Accounting) {
    gate.epoch += 1;
    if let Some(timer) = gate.idle_timer.take() {
        timer.abort();
    }
}

#[cfg(test)]
#[path = "slot_tests.rs"]
mod tests;
