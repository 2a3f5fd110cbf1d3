use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{LaunchError, LaunchOutcome, Multiplexer};
use crate::session::{SessionConfig, TerminalKind};
use crate::tools::split_command;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    /// `<terminal> -e entry args` in a new window.
    Terminal { program: String, args: Vec<String> },
    /// `<viewer> path`, no engine at all.
    Viewer {
        program: String,
        args: Vec<String>,
        target: PathBuf,
    },
}

/// Generic fallback: a separate terminal window, or an external viewer.
#[derive(Debug, Clone)]
pub struct ExternalTerminal {
    mode: Mode,
}

impl ExternalTerminal {
    /// Prefer the viewer when one is configured and there is a path to show.
    pub fn new(
        terminal: Option<String>,
        viewer: Option<String>,
        target: Option<PathBuf>,
    ) -> Result<Self, LaunchError> {
        if let (Some((program, args)), Some(target)) = (viewer.as_deref().and_then(split_command), target) {
            return Ok(Self {
                mode: Mode::Viewer { program, args, target },
            });
        }
        match terminal.as_deref().and_then(split_command) {
            Some((program, args)) => Ok(Self {
                mode: Mode::Terminal { program, args },
            }),
            None => Err(LaunchError::NoTerminal),
        }
    }

    pub fn is_viewer(&self) -> bool {
        matches!(self.mode, Mode::Viewer { .. })
    }
}

impl Multiplexer for ExternalTerminal {
    fn kind(&self) -> TerminalKind {
        TerminalKind::External
    }

    fn commands(&self, entry: &Path, args: &[OsString], config: &SessionConfig) -> Vec<Command> {
        let cmd = match &self.mode {
            Mode::Terminal { program, args: term_args } => {
                let mut cmd = Command::new(program);
                cmd.args(term_args).arg("-e").arg(entry).args(args);
                cmd.envs(config.to_env()).current_dir(&config.cwd);
                cmd
            }
            Mode::Viewer { program, args: viewer_args, target } => {
                let mut cmd = Command::new(program);
                cmd.args(viewer_args).arg(target).current_dir(&config.cwd);
                cmd
            }
        };
        vec![cmd]
    }

    /// The window or viewer outlives this call; it is started detached.
    fn open(&self, entry: &Path, args: &[OsString], config: &SessionConfig) -> Result<LaunchOutcome, LaunchError> {
        let mut outcome = None;
        for mut cmd in self.commands(entry, args, config) {
            let program = cmd.get_program().to_string_lossy().into_owned();
            let child = cmd
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .process_group(0)
                .spawn()
                .map_err(|source| LaunchError::Spawn { program, source })?;
            let pid = child.id();
            outcome = Some(if self.is_viewer() {
                LaunchOutcome::Viewer { pid }
            } else {
                LaunchOutcome::Terminal { pid }
            });
        }
        outcome.ok_or(LaunchError::NoTerminal)
    }
}
