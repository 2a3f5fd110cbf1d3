//! Hover channel reader.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Reserved line that ends the session.
pub const CLOSE_TOKEN: &str = "close";

/// One event read from the hover channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoverEvent {
    /// The browser selected a path.
    Select(PathBuf),
    /// `close` was received or every writer went away.
    Close,
    /// The blocking read was interrupted by a signal; nothing was consumed.
    Interrupted,
}

/// Blocking, single-consumer reader over the hover conduit.
pub struct HoverChannel<R = File> {
    reader: R,
    pending: Vec<u8>,
    cwd: PathBuf,
    eof: bool,
}

impl HoverChannel<File> {
    /// Open the read end. Blocks until the browser opens the write end.
    pub fn open(path: &Path, cwd: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(file, cwd))
    }
}

impl<R: Read> HoverChannel<R> {
    pub fn from_reader(reader: R, cwd: &Path) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            cwd: cwd.to_path_buf(),
            eof: false,
        }
    }

    /// Wait for the next event. Empty lines are skipped.
    pub fn next_event(&mut self) -> io::Result<HoverEvent> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(event) = self.take_line() {
                match event {
                    Some(event) => return Ok(event),
                    None => continue,
                }
            }
            if self.eof {
                return Ok(HoverEvent::Close);
            }

            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    if !self.pending.is_empty() {
                        // Final line without a newline terminator.
                        self.pending.push(b'\n');
                    }
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    return Ok(HoverEvent::Interrupted);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Pop one complete line. `Some(None)` means an empty line was skipped.
    fn take_line(&mut self) -> Option<Option<HoverEvent>> {
        let newline = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=newline).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            return Some(None);
        }
        if line == CLOSE_TOKEN.as_bytes() {
            return Some(Some(HoverEvent::Close));
        }

        let path = Path::new(OsStr::from_bytes(&line));
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        };
        Some(Some(HoverEvent::Select(path)))
    }
}
