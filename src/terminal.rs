//! Pane geometry, screen clearing and the terminal's foreground group.

use std::io::{self, Write};
use std::os::unix::io::RawFd;

/// Size of the preview pane in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for PaneSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

impl PaneSize {
    /// Query the controlling terminal, falling back to `COLUMNS`/`LINES`
    /// and then to 80x24.
    pub fn detect() -> Self {
        if let Some(size) = ioctl_size(libc::STDOUT_FILENO) {
            return size;
        }
        let from_env = |key: &str| std::env::var(key).ok().and_then(|v| v.parse::<u16>().ok());
        match (from_env("COLUMNS"), from_env("LINES")) {
            (Some(cols), Some(rows)) if cols > 0 && rows > 0 => Self { cols, rows },
            _ => Self::default(),
        }
    }
}

fn ioctl_size(fd: libc::c_int) -> Option<PaneSize> {
    // SAFETY: winsize is plain data and TIOCGWINSZ only writes into it.
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws) };
    if rc == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(PaneSize {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    } else {
        None
    }
}

/// Clear the screen and home the cursor.
pub fn clear_screen(out: &mut dyn Write) -> io::Result<()> {
    out.write_all(b"\x1b[2J\x1b[H")?;
    out.flush()
}

/// The pane's terminal, as seen by a process whose group owns it.
///
/// Only the foreground process group may change terminal modes or read
/// from it, so each render job takes the terminal for its own group and
/// the engine takes it back once the job is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Foreground {
    fd: RawFd,
}

impl Foreground {
    /// The first standard stream on a terminal whose foreground group is
    /// the caller's. `None` when not running in the foreground.
    ///
    /// Output streams come first: jobs inherit them, while their stdin is
    /// already `/dev/null` when they claim the terminal.
    pub fn detect() -> Option<Self> {
        // SAFETY: getpgrp cannot fail and tcgetpgrp only queries the fd.
        let own = unsafe { libc::getpgrp() };
        [libc::STDOUT_FILENO, libc::STDERR_FILENO, libc::STDIN_FILENO]
            .into_iter()
            .find(|&fd| unsafe { libc::tcgetpgrp(fd) } == own)
            .map(|fd| Self { fd })
    }

    /// Make the caller's process group the foreground group. Works from a
    /// background group as well. Async-signal-safe, so it may run between
    /// fork and exec.
    pub fn claim(&self) -> io::Result<()> {
        // SAFETY: getpgrp cannot fail.
        set_foreground(self.fd, unsafe { libc::getpgrp() })
    }

    /// Give the terminal to the parent's process group.
    pub fn return_to_parent(&self) -> io::Result<()> {
        // SAFETY: getppid cannot fail; getpgid reports errors via -1.
        let group = unsafe { libc::getpgid(libc::getppid()) };
        if group < 0 {
            return Err(io::Error::last_os_error());
        }
        set_foreground(self.fd, group)
    }
}

/// `tcsetpgrp` with SIGTTOU blocked, which a background caller needs to
/// avoid being stopped.
fn set_foreground(fd: RawFd, group: libc::pid_t) -> io::Result<()> {
    // SAFETY: the sigset is initialised by sigemptyset, the previous mask
    // is restored before returning, and tcsetpgrp only touches the fd.
    unsafe {
        let mut block: libc::sigset_t = std::mem::zeroed();
        let mut previous: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut block);
        libc::sigaddset(&mut block, libc::SIGTTOU);
        libc::sigprocmask(libc::SIG_BLOCK, &block, &mut previous);
        let rc = libc::tcsetpgrp(fd, group);
        let result = if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) };
        libc::sigprocmask(libc::SIG_SETMASK, &previous, std::ptr::null_mut());
        result
    }
}
