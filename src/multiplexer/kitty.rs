use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use super::{env_assignments, Multiplexer};
use crate::session::{SessionConfig, SplitDir, TerminalKind};

/// kitty remote-control split through `kitty @ launch`.
#[derive(Debug, Clone, Default)]
pub struct KittySplit {
    listen_on: Option<String>,
}

impl KittySplit {
    pub fn new(listen_on: Option<String>) -> Self {
        Self { listen_on }
    }
}

impl Multiplexer for KittySplit {
    fn kind(&self) -> TerminalKind {
        TerminalKind::Kitty
    }

    fn commands(&self, entry: &Path, args: &[OsString], config: &SessionConfig) -> Vec<Command> {
        let mut cmd = Command::new("kitty");
        cmd.arg("@");
        if let Some(socket) = &self.listen_on {
            cmd.arg("--to").arg(socket);
        }
        cmd.args(["launch", "--no-response", "--keep-focus"]);
        cmd.arg("--cwd").arg(&config.cwd);
        for assignment in env_assignments(config) {
            cmd.arg("--env").arg(assignment);
        }
        cmd.arg(match config.split_dir {
            SplitDir::Horizontal => "--location=hsplit",
            SplitDir::Vertical => "--location=vsplit",
        });
        cmd.arg("--bias").arg(config.split_size_pct.to_string());
        cmd.arg("--").arg(entry).args(args);
        vec![cmd]
    }
}
