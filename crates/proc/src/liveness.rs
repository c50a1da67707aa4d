// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Non-destructive backend liveness probing.
//!
//! A live process accepts the null signal and, where per-process status is
//! exposed, is not a zombie. This check deliberately overlaps the exit
//! watcher: the watcher is authoritative but asynchronous, and the probe
//! covers the window where it has not yet run.

/// Report whether `pid` is alive and able to serve.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    if pid == 0 {
        return false;
    }
    if kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    !is_zombie(pid)
}

/// Platforms without job-control signals report alive and rely on the exit
/// watcher to clear stale state.
#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    true
}

// /proc/<pid>/stat is "pid (comm) state ...". comm may itself contain
// parentheses, so the state field follows the last ')'.
#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .map(|(_, rest)| rest.trim_start().starts_with('Z'))
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    false
}

#[cfg(test)]
#[path = "liveness_tests.rs"]
mod tests;
