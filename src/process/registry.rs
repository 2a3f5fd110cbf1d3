//! One live process per role, mirrored into pid files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::handle::{pid_alive, ProcessHandle, Role, Termination};

/// Tracks at most one [`ProcessHandle`] per [`Role`].
///
/// Every registered handle is mirrored to `<pid_dir>/<role>.pid` so other
/// processes (the supervisor in particular) can find it.
#[derive(Debug)]
pub struct ProcessRegistry {
    pid_dir: PathBuf,
    handles: HashMap<Role, ProcessHandle>,
}

impl ProcessRegistry {
    pub fn new(pid_dir: impl Into<PathBuf>) -> Self {
        Self {
            pid_dir: pid_dir.into(),
            handles: HashMap::new(),
        }
    }

    pub fn pid_dir(&self) -> &Path {
        &self.pid_dir
    }

    pub fn pid_file(&self, role: Role) -> PathBuf {
        pid_file_in(&self.pid_dir, role)
    }

    /// Install a handle, terminating whatever held the role before.
    /// Returns how the previous holder ended, if there was one.
    pub fn register(&mut self, handle: ProcessHandle) -> Option<Termination> {
        let role = handle.role();
        let previous = self.terminate(role);

        let pid_file = self.pid_file(role);
        if let Err(e) = write_pid_file(&pid_file, handle.pid()) {
            log::warn!("Failed to write {}: {}", pid_file.display(), e);
        }
        self.handles.insert(role, handle);
        previous
    }

    /// Record the current process under `role`.
    pub fn record_self(&mut self, role: Role) {
        self.register(ProcessHandle::from_pid(role, std::process::id()));
    }

    /// Stop the process holding `role` and forget it. `None` if the role
    /// was empty.
    pub fn terminate(&mut self, role: Role) -> Option<Termination> {
        let mut handle = self.handles.remove(&role)?;
        let _ = std::fs::remove_file(self.pid_file(role));

        if handle.pid() == std::process::id() {
            // Never signal ourselves; forgetting the record is enough.
            return Some(Termination::AlreadyExited);
        }
        match handle.terminate() {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::warn!("Failed to terminate {} pid {}: {}", role, handle.pid(), e);
                Some(Termination::AlreadyExited)
            }
        }
    }

    /// Whether the role is held by a process that is still running.
    pub fn is_live(&mut self, role: Role) -> bool {
        self.handles
            .get_mut(&role)
            .map(|h| !h.has_exited())
            .unwrap_or(false)
    }

    pub fn pid(&self, role: Role) -> Option<u32> {
        self.handles.get(&role).map(|h| h.pid())
    }

    /// Stop every tracked process and remove every pid file. Safe to call
    /// any number of times.
    pub fn teardown(&mut self) {
        for role in Role::ALL {
            self.terminate(role);
            let _ = std::fs::remove_file(self.pid_file(role));
        }
    }
}

impl Drop for ProcessRegistry {
    fn drop(&mut self) {
        self.teardown();
    }
}

pub(crate) fn pid_file_in(dir: &Path, role: Role) -> PathBuf {
    dir.join(format!("{}.pid", role.as_str()))
}

fn write_pid_file(path: &Path, pid: u32) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, pid.to_string())
}

/// Read a pid recorded by another process. Stale records (dead pid or
/// garbage content) are removed and reported as absent.
pub fn read_recorded(pid_dir: &Path, role: Role) -> Option<ProcessHandle> {
    let path = pid_file_in(pid_dir, role);
    let contents = std::fs::read_to_string(&path).ok()?;

    match contents.trim().parse::<u32>() {
        Ok(pid) if pid_alive(pid) => Some(ProcessHandle::from_pid(role, pid)),
        _ => {
            log::debug!("Removing stale pid file {}", path.display());
            let _ = std::fs::remove_file(&path);
            None
        }
    }
}
