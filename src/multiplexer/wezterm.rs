use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use super::{env_wrapped, Multiplexer};
use crate::session::{SessionConfig, SplitDir, TerminalKind};

/// WezTerm CLI split. Focus is handed back to the browser pane afterwards.
#[derive(Debug, Clone, Default)]
pub struct WeztermSplit {
    origin_pane: Option<String>,
}

impl WeztermSplit {
    pub fn new(origin_pane: Option<String>) -> Self {
        Self { origin_pane }
    }
}

impl Multiplexer for WeztermSplit {
    fn kind(&self) -> TerminalKind {
        TerminalKind::Wezterm
    }

    fn commands(&self, entry: &Path, args: &[OsString], config: &SessionConfig) -> Vec<Command> {
        let mut split = Command::new("wezterm");
        split.args(["cli", "split-pane"]);
        split.arg(match config.split_dir {
            SplitDir::Horizontal => "--bottom",
            SplitDir::Vertical => "--right",
        });
        split.arg("--percent").arg(config.split_size_pct.to_string());
        split.arg("--cwd").arg(&config.cwd);
        split.arg("--").args(env_wrapped(entry, args, config));

        let mut commands = vec![split];
        if let Some(pane) = &self.origin_pane {
            let mut focus = Command::new("wezterm");
            focus.args(["cli", "activate-pane", "--pane-id", pane]);
            commands.push(focus);
        }
        commands
    }
}
