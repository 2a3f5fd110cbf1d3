//! A tracked process with a role and a deterministic terminate-and-wait.

use std::fmt;
use std::io;
use std::process::Child;
use std::time::{Duration, Instant};

use super::error::ProcessError;

/// How long a process gets to exit after SIGTERM before SIGKILL.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// What a tracked process is used for. At most one live handle per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The renderer engine of a live session.
    Session,
    /// The job rendering the current selection.
    RenderJob,
    /// The persistent overlay (ueberzug) listener.
    OverlayListener,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Session, Role::RenderJob, Role::OverlayListener];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Session => "session",
            Role::RenderJob => "render-job",
            Role::OverlayListener => "overlay-listener",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`ProcessHandle::terminate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process was still running and has been stopped.
    Terminated,
    /// The process had already finished on its own.
    AlreadyExited,
}

/// A process owned by this session (a spawned child) or recorded by
/// another one (a pid read back from a pid file).
#[derive(Debug)]
pub struct ProcessHandle {
    role: Role,
    pid: u32,
    child: Option<Child>,
    /// The process leads its own process group; signals go to the group.
    group: bool,
    reaped: bool,
}

impl ProcessHandle {
    /// Track a spawned child. `group` must be true only if the child was
    /// spawned with `process_group(0)`.
    pub fn from_child(role: Role, child: Child, group: bool) -> Self {
        Self {
            role,
            pid: child.id(),
            child: Some(child),
            group,
            reaped: false,
        }
    }

    /// Track a process this session did not spawn.
    pub fn from_pid(role: Role, pid: u32) -> Self {
        Self {
            role,
            pid,
            child: None,
            group: false,
            reaped: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Check whether the process has finished, reaping it if it is ours.
    pub fn has_exited(&mut self) -> bool {
        if self.reaped {
            return true;
        }
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(Some(_)) => {
                    self.reaped = true;
                    true
                }
                Ok(None) => false,
                Err(_) => true,
            },
            None => !pid_alive(self.pid),
        }
    }

    /// Send SIGTERM, wait for the process to go away and escalate to
    /// SIGKILL after [`TERMINATE_GRACE`]. A process that already exited is
    /// not an error.
    pub fn terminate(&mut self) -> Result<Termination, ProcessError> {
        let already = self.has_exited();

        // The group may still hold children of a leader that exited.
        if self.group || !already {
            if !self.send(libc::SIGTERM)? && !self.group {
                return Ok(Termination::AlreadyExited);
            }
            // A stopped process acts on SIGTERM only once continued.
            let _ = self.send(libc::SIGCONT);
        }
        if already {
            return Ok(Termination::AlreadyExited);
        }

        let deadline = Instant::now() + TERMINATE_GRACE;
        while Instant::now() < deadline {
            if self.has_exited() {
                return Ok(Termination::Terminated);
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        log::warn!(
            "{} pid {} ignored SIGTERM, sending SIGKILL",
            self.role,
            self.pid
        );
        self.send(libc::SIGKILL)?;
        self.wait_gone()?;
        Ok(Termination::Terminated)
    }

    /// Deliver a signal to the process or its group. Returns false if the
    /// target no longer exists.
    fn send(&self, signal: libc::c_int) -> Result<bool, ProcessError> {
        let target = if self.group {
            -(self.pid as libc::pid_t)
        } else {
            self.pid as libc::pid_t
        };
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(target, signal) };
        if rc == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(false)
        } else {
            Err(ProcessError::Signal {
                pid: self.pid,
                source: err,
            })
        }
    }

    fn wait_gone(&mut self) -> Result<(), ProcessError> {
        let pid = self.pid;
        match self.child.as_mut() {
            Some(child) => {
                child
                    .wait()
                    .map_err(|source| ProcessError::Wait { pid, source })?;
            }
            None => {
                // Not our child: we can only watch for it to disappear.
                let deadline = Instant::now() + TERMINATE_GRACE;
                while pid_alive(pid) && Instant::now() < deadline {
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
        self.reaped = true;
        Ok(())
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // Only processes we spawned are ours to stop.
        if self.child.is_some() && !self.has_exited() {
            let _ = self.terminate();
        }
    }
}

/// Whether a pid refers to a running process. A zombie has finished and
/// counts as gone.
pub fn pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    if let Some(state) = proc_state(pid) {
        return state != 'Z' && state != 'X';
    }
    // No procfs entry: either gone or no procfs at all.
    // SAFETY: signal 0 only performs permission and existence checks.
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Scheduler state letter from `/proc/<pid>/stat`.
fn proc_state(pid: u32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    // The command name may contain spaces and parentheses; the state
    // follows the last closing one.
    let (_, rest) = stat.rsplit_once(')')?;
    rest.trim_start().chars().next()
}
