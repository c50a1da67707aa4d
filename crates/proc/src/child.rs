// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend child processes: spawn, output drains, group termination.
//!
//! Children run in their own process group so termination reaps
//! grandchildren (a launcher script that forks the real server, for
//! example). On Linux a parent-death signal ties the child's lifetime to
//! the supervisor's.

use rbin_core::LaunchPlan;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;

/// A freshly spawned backend with its output pipes still attached.
pub struct Spawned {
    pub pid: u32,
    pub child: Child,
}

/// Build and spawn the backend command for a launch plan.
///
/// The child gets exactly the environment passed in, null stdin, and piped
/// stdout/stderr for the line drains. The kill-on-drop handle is a backstop;
/// normal termination goes through [`kill_group`].
pub fn spawn(plan: &LaunchPlan, env: Vec<(String, String)>) -> std::io::Result<Spawned> {
    let Some((program, args)) = plan.executable.split_first() else {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty executable"));
    };
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(&plan.working_dir)
        .env_clear()
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    isolate(&mut cmd);
    let child = cmd.spawn()?;
    let pid = child.id().ok_or_else(|| std::io::Error::other("spawned child has no pid"))?;
    Ok(Spawned { pid, child })
}

/// Put the command in its own process group; on Linux, have the kernel
/// deliver SIGKILL to the child if the supervisor dies first.
pub(crate) fn isolate(cmd: &mut Command) {
    #[cfg(unix)]
    cmd.process_group(0);
    #[cfg(target_os = "linux")]
    set_parent_death_signal(cmd);
}

// pre_exec runs between fork and exec; prctl is async-signal-safe there.
#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
fn set_parent_death_signal(cmd: &mut Command) {
    use nix::sys::prctl::set_pdeathsig;
    use nix::sys::signal::Signal;
    unsafe {
        cmd.pre_exec(|| set_pdeathsig(Signal::SIGKILL).map_err(std::io::Error::from));
    }
}

/// Spawn the line drains for a child's stdout and stderr. Each drain emits
/// one log event per line, tagged with the child's pid, and ends when its
/// pipe closes.
pub fn drain_lines(
    pid: u32,
    stdout: ChildStdout,
    stderr: ChildStderr,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let out = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::info!(pid, %line, "backend stdout");
        }
    });
    let err = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::warn!(pid, %line, "backend stderr");
        }
    });
    (out, err)
}

/// Terminate a child's whole process group with SIGKILL. Reclamation must
/// not depend on the child cooperating, and the group scope reaps
/// grandchildren too.
#[cfg(unix)]
pub fn kill_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    if pid == 0 {
        return;
    }
    if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        tracing::debug!(pid, %err, "process group kill failed");
    }
}

/// Platforms without process groups fall back to the kill-on-drop handle.
#[cfg(not(unix))]
pub fn kill_group(_pid: u32) {}

#[cfg(test)]
#[path = "child_tests.rs"]
mod tests;
