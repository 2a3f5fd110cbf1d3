//! Session-active signalling toward the browser.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use super::fifo::{open_writer, WriterOpen};

/// Write end of the control channel (renderer to browser).
#[derive(Debug, Clone)]
pub struct ControlChannel {
    path: Option<PathBuf>,
}

impl ControlChannel {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Tell the browser whether a session is live. Returns whether the byte
    /// was delivered; a missing reader is a silent drop.
    pub fn signal(&self, active: bool) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        let byte: &[u8] = if active { b"1" } else { b"0" };

        match open_writer(path) {
            WriterOpen::Ready(mut file) => match file.write_all(byte) {
                Ok(()) => true,
                Err(e) => {
                    log::debug!("Control write to {} dropped: {}", path.display(), e);
                    false
                }
            },
            WriterOpen::NoReader => {
                log::debug!("No reader on control channel {}", path.display());
                false
            }
            WriterOpen::Unavailable => false,
        }
    }
}

/// Read the single preview-control byte once at session start.
///
/// `Some(true)` means hover notification is enabled, `Some(false)` that an
/// external program suspended it. Absent, empty or unreadable conduits give
/// `None`.
pub fn read_preview_control(path: Option<&Path>) -> Option<bool> {
    let path = path?;
    let mut file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .ok()?;

    let mut byte = [0u8; 1];
    match file.read(&mut byte) {
        Ok(1) => match byte[0] {
            b'0' => Some(false),
            b'1' => Some(true),
            other => {
                log::debug!("Ignoring preview-control byte {:?}", other as char);
                None
            }
        },
        _ => None,
    }
}
