use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use super::{env_assignments, Multiplexer};
use crate::session::{SessionConfig, SplitDir, TerminalKind};

/// Native tmux split of the current window. Focus stays on the browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct TmuxSplit;

impl Multiplexer for TmuxSplit {
    fn kind(&self) -> TerminalKind {
        TerminalKind::Tmux
    }

    fn commands(&self, entry: &Path, args: &[OsString], config: &SessionConfig) -> Vec<Command> {
        let mut cmd = Command::new("tmux");
        cmd.arg("split-window").arg("-d");
        // tmux names splits by the direction panes are laid out in.
        cmd.arg(match config.split_dir {
            SplitDir::Horizontal => "-v",
            SplitDir::Vertical => "-h",
        });
        cmd.arg("-l").arg(format!("{}%", config.split_size_pct));
        cmd.arg("-c").arg(&config.cwd);
        for assignment in env_assignments(config) {
            cmd.arg("-e").arg(assignment);
        }
        cmd.arg("--").arg(entry).args(args);
        vec![cmd]
    }
}
