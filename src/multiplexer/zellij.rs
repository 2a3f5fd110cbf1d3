use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use super::{env_wrapped, Multiplexer};
use crate::session::{SessionConfig, SplitDir, TerminalKind};

/// Zellij pane opened with `zellij run`, then focus moved back.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZellijPane;

impl Multiplexer for ZellijPane {
    fn kind(&self) -> TerminalKind {
        TerminalKind::Zellij
    }

    fn commands(&self, entry: &Path, args: &[OsString], config: &SessionConfig) -> Vec<Command> {
        let (direction, back) = match config.split_dir {
            SplitDir::Horizontal => ("down", "up"),
            SplitDir::Vertical => ("right", "left"),
        };

        let mut run = Command::new("zellij");
        run.args(["run", "--close-on-exit", "--direction", direction]);
        run.arg("--cwd").arg(&config.cwd);
        run.arg("--").args(env_wrapped(entry, args, config));

        let mut focus = Command::new("zellij");
        focus.args(["action", "move-focus", back]);
        vec![run, focus]
    }
}
