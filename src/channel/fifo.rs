//! POSIX FIFO helpers.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::Path;

use super::ChannelError;

/// Create a FIFO at `path` unless one already exists there.
pub fn create_fifo(path: &Path) -> Result<(), ChannelError> {
    if is_fifo(path) {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ChannelError::Create {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| ChannelError::Create {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, e),
    })?;
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::AlreadyExists {
            return Err(ChannelError::Create {
                path: path.to_path_buf(),
                source: err,
            });
        }
    }
    Ok(())
}

/// Remove a FIFO. Missing files are not an error.
pub fn remove_fifo(path: &Path) {
    if is_fifo(path) {
        if let Err(e) = std::fs::remove_file(path) {
            log::debug!("Could not remove fifo {}: {}", path.display(), e);
        }
    }
}

pub(crate) fn is_fifo(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.file_type().is_fifo())
        .unwrap_or(false)
}

/// Result of trying to open the write end of a conduit.
#[derive(Debug)]
pub enum WriterOpen {
    /// A reader is attached; writes will be delivered.
    Ready(File),
    /// The conduit exists but nobody is reading.
    NoReader,
    /// The conduit does not exist or cannot be opened.
    Unavailable,
}

/// Open the write end without ever blocking on a missing reader.
///
/// Regular files are accepted too, which keeps tests and non-FIFO setups
/// working.
pub fn open_writer(path: &Path) -> WriterOpen {
    let result = OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path);

    match result {
        Ok(file) => {
            clear_nonblocking(&file);
            WriterOpen::Ready(file)
        }
        Err(e) if e.raw_os_error() == Some(libc::ENXIO) => WriterOpen::NoReader,
        Err(e) => {
            log::debug!("Conduit {} unavailable: {}", path.display(), e);
            WriterOpen::Unavailable
        }
    }
}

pub(crate) fn clear_nonblocking(file: &File) {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: fd is owned by `file` and valid for both calls.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags >= 0 {
            libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_fifo_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hover.fifo");

        create_fifo(&path).unwrap();
        assert!(is_fifo(&path));
        create_fifo(&path).unwrap();
        assert!(is_fifo(&path));
    }

    #[test]
    fn test_writer_without_reader_does_not_block() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("control.fifo");
        create_fifo(&path).unwrap();

        assert!(matches!(open_writer(&path), WriterOpen::NoReader));
    }

    #[test]
    fn test_writer_on_missing_path_is_unavailable() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            open_writer(&dir.path().join("absent")),
            WriterOpen::Unavailable
        ));
    }

    #[test]
    fn test_remove_fifo_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.fifo");
        remove_fifo(&path);
        create_fifo(&path).unwrap();
        remove_fifo(&path);
        assert!(!path.exists());
        remove_fifo(&path);
    }
}
