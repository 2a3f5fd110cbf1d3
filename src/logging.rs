//! Logger setup.
//!
//! The renderer owns its pane, so log lines go to `<runtime_dir>/preview-pane.log`
//! instead of the terminal. Level comes from `PREVIEW_PANE_LOG` (default `warn`).

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use env_logger::{Builder, Env, Target};

pub const LOG_ENV: &str = "PREVIEW_PANE_LOG";

pub fn log_file(runtime_dir: &Path) -> PathBuf {
    runtime_dir.join("preview-pane.log")
}

/// Route logs to the runtime log file. If the file cannot be opened the
/// logger is left uninstalled and logging is off.
pub fn init_to_file(runtime_dir: &Path) {
    let path = log_file(runtime_dir);
    if std::fs::create_dir_all(runtime_dir).is_err() {
        return;
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let _ = Builder::from_env(Env::new().filter_or(LOG_ENV, "warn"))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init();
}

/// Log to stderr, for commands that run in the user's own terminal.
pub fn init_to_stderr() {
    let _ = Builder::from_env(Env::new().filter_or(LOG_ENV, "warn"))
        .format_timestamp(None)
        .try_init();
}
