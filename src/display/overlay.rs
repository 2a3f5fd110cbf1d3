//! Overlay image layer.
//!
//! An `ueberzug` style listener runs beside the engine and reads JSON
//! commands, one per line, from a FIFO in the runtime directory. Jobs append
//! `add` commands; the engine appends `remove` before every new selection.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;

use crate::channel::{clear_nonblocking, create_fifo, open_writer, remove_fifo, WriterOpen};
use crate::process::{ProcessHandle, Role};
use crate::tools::Toolbox;

/// Identifier of the single placement the session manages.
pub const IDENTIFIER: &str = "preview";

const FIFO_NAME: &str = "overlay.fifo";

/// A command understood by the overlay listener.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum OverlayCommand<'a> {
    Add {
        identifier: &'a str,
        x: i32,
        y: i32,
        width: u16,
        height: u16,
        scaler: &'a str,
        path: &'a Path,
    },
    Remove {
        identifier: &'a str,
    },
}

impl<'a> OverlayCommand<'a> {
    pub fn add(path: &'a Path, (x, y): (i32, i32), width: u16, height: u16) -> Self {
        OverlayCommand::Add {
            identifier: IDENTIFIER,
            x,
            y,
            width,
            height,
            scaler: "fit_contain",
            path,
        }
    }

    pub fn remove() -> Self {
        OverlayCommand::Remove {
            identifier: IDENTIFIER,
        }
    }

    /// One JSON document terminated by a newline. Fails only for paths
    /// that are not valid UTF-8.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Path of the overlay conduit for a session.
pub fn fifo_path(runtime_dir: &Path) -> PathBuf {
    runtime_dir.join(FIFO_NAME)
}

/// Append `command` to the conduit. Returns `false` when no listener is
/// attached.
pub fn send(fifo: &Path, command: &OverlayCommand<'_>) -> bool {
    let line = match command.to_line() {
        Ok(line) => line,
        Err(e) => {
            log::warn!("Cannot encode overlay command: {}", e);
            return false;
        }
    };
    match open_writer(fifo) {
        WriterOpen::Ready(mut file) => match file.write_all(line.as_bytes()) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Overlay write failed: {}", e);
                false
            }
        },
        WriterOpen::NoReader | WriterOpen::Unavailable => false,
    }
}

/// Whether a listener is attached to the conduit. Only the listener holds
/// the read end, so this turns false as soon as it exits.
pub fn is_listening(fifo: &Path) -> bool {
    matches!(open_writer(fifo), WriterOpen::Ready(_))
}

/// Read the placement offset: two whitespace-separated integers. Missing or
/// malformed files mean `0 0`.
pub fn read_offset(path: Option<&Path>) -> (i32, i32) {
    let Some(path) = path else {
        return (0, 0);
    };
    let Ok(text) = std::fs::read_to_string(path) else {
        return (0, 0);
    };
    parse_offset(&text).unwrap_or((0, 0))
}

fn parse_offset(text: &str) -> Option<(i32, i32)> {
    let mut parts = text.split_whitespace().map(|p| p.parse::<i32>());
    match (parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y))) => Some((x, y)),
        _ => None,
    }
}

/// The engine side of a running overlay listener.
///
/// Holds a write end of the conduit so the listener never sees end-of-file
/// between jobs. The read end belongs to the listener alone. Dropping it
/// removes the conduit.
#[derive(Debug)]
pub struct OverlayLayer {
    fifo: PathBuf,
    hold: File,
}

impl OverlayLayer {
    /// Start a listener if one is installed. The returned handle belongs in
    /// the registry under [`Role::OverlayListener`].
    pub fn start(runtime_dir: &Path, tools: &Toolbox) -> Option<(Self, ProcessHandle)> {
        let (program, _) = tools.first(&["ueberzug", "ueberzugpp"])?;
        match Self::spawn(program, runtime_dir, tools) {
            Ok(started) => Some(started),
            Err(e) => {
                log::warn!("Overlay listener {} did not start: {}", program, e);
                remove_fifo(&fifo_path(runtime_dir));
                None
            }
        }
    }

    fn spawn(program: &str, runtime_dir: &Path, tools: &Toolbox) -> io::Result<(Self, ProcessHandle)> {
        let fifo = fifo_path(runtime_dir);
        create_fifo(&fifo).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        // Non-blocking so the open does not wait for a writer; the listener
        // then reads in blocking mode.
        let reader = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&fifo)?;
        clear_nonblocking(&reader);
        let hold = OpenOptions::new().write(true).open(&fifo)?;

        let mut cmd = tools
            .command(program)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, program.to_string()))?;
        cmd.arg("layer").arg("--silent");
        if program == "ueberzug" {
            cmd.args(["--parser", "json"]);
        }
        let child = cmd
            .stdin(reader)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()?;
        drop(cmd);
        log::info!("Overlay listener {} started (pid {})", program, child.id());

        let handle = ProcessHandle::from_child(Role::OverlayListener, child, true);
        Ok((Self { fifo, hold }, handle))
    }

    pub fn fifo(&self) -> &Path {
        &self.fifo
    }

    /// Clear the current placement.
    pub fn remove_entry(&self) {
        let Ok(line) = OverlayCommand::remove().to_line() else {
            return;
        };
        let mut hold = &self.hold;
        if let Err(e) = hold.write_all(line.as_bytes()) {
            log::debug!("Overlay remove failed: {}", e);
        }
    }
}

impl Drop for OverlayLayer {
    fn drop(&mut self) {
        remove_fifo(&self.fifo);
    }
}
