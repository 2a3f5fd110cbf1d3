//! Opening the preview pane in the host terminal environment.
//!
//! Each adapter turns "run this entry point with this session" into argv
//! lists for its host. Nothing is ever passed through a shell; environment
//! values travel as `env KEY=VALUE` argv entries where the host cannot set
//! them directly.

mod external;
mod kitty;
mod screen;
mod tmux;
mod wezterm;
mod zellij;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

pub use external::ExternalTerminal;
pub use kitty::KittySplit;
pub use screen::ScreenSplit;
pub use tmux::TmuxSplit;
pub use wezterm::WeztermSplit;
pub use zellij::ZellijPane;

use crate::session::{SessionConfig, TerminalKind};

/// What opening the pane produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// A pane was split off inside the host; the engine runs there.
    Pane,
    /// A separate terminal window was started.
    Terminal { pid: u32 },
    /// An external viewer was opened on the path instead of an engine.
    Viewer { pid: u32 },
}

/// Error opening the preview pane.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Status { program: String, status: ExitStatus },

    #[error("no external terminal configured; set terminal.external or $TERMINAL")]
    NoTerminal,
}

/// A host that can open a pane running `entry args`.
pub trait Multiplexer {
    fn kind(&self) -> TerminalKind;

    /// The host commands to run, in order.
    fn commands(&self, entry: &Path, args: &[OsString], config: &SessionConfig) -> Vec<Command>;

    /// Open the pane. The default runs every command to completion.
    fn open(&self, entry: &Path, args: &[OsString], config: &SessionConfig) -> Result<LaunchOutcome, LaunchError> {
        for mut cmd in self.commands(entry, args, config) {
            run_to_completion(&mut cmd)?;
        }
        Ok(LaunchOutcome::Pane)
    }
}

/// Facts about the host gathered by the supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
    /// kitty remote-control socket (`KITTY_LISTEN_ON`).
    pub kitty_listen_on: Option<String>,
    /// Pane the browser runs in (`WEZTERM_PANE`), refocused after the split.
    pub wezterm_pane: Option<String>,
    pub external_terminal: Option<String>,
    pub external_viewer: Option<String>,
    /// The selection the session starts on.
    pub target: Option<PathBuf>,
}

/// Build the adapter for `kind`.
pub fn adapter_for(kind: TerminalKind, host: &HostInfo) -> Result<Box<dyn Multiplexer>, LaunchError> {
    Ok(match kind {
        TerminalKind::Tmux => Box::new(TmuxSplit),
        TerminalKind::Kitty => Box::new(KittySplit::new(host.kitty_listen_on.clone())),
        TerminalKind::Wezterm => Box::new(WeztermSplit::new(host.wezterm_pane.clone())),
        TerminalKind::Zellij => Box::new(ZellijPane),
        TerminalKind::Screen => Box::new(ScreenSplit),
        TerminalKind::External => Box::new(ExternalTerminal::new(
            host.external_terminal.clone(),
            host.external_viewer.clone(),
            host.target.clone(),
        )?),
    })
}

/// `KEY=VALUE` argv entries for every session key.
pub(crate) fn env_assignments(config: &SessionConfig) -> Vec<OsString> {
    config
        .to_env()
        .into_iter()
        .map(|(key, value)| {
            let mut entry = OsString::from(key);
            entry.push("=");
            entry.push(value);
            entry
        })
        .collect()
}

/// `env KEY=VALUE... entry args...`
pub(crate) fn env_wrapped(entry: &Path, args: &[OsString], config: &SessionConfig) -> Vec<OsString> {
    let mut argv = vec![OsString::from("env")];
    argv.extend(env_assignments(config));
    argv.push(entry.as_os_str().to_owned());
    argv.extend(args.iter().cloned());
    argv
}

fn run_to_completion(cmd: &mut Command) -> Result<(), LaunchError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    log::debug!("Running {} {:?}", program, cmd.get_args().collect::<Vec<_>>());
    let status = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .status()
        .map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(LaunchError::Status { program, status })
    }
}
