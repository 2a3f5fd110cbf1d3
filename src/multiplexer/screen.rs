use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use super::{env_wrapped, Multiplexer};
use crate::session::{SessionConfig, SplitDir, TerminalKind};

/// GNU screen region split: split, move into the new region, start a window
/// there and return to the browser region.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScreenSplit;

fn screen(args: &[&str]) -> Command {
    let mut cmd = Command::new("screen");
    cmd.arg("-X").args(args);
    cmd
}

impl Multiplexer for ScreenSplit {
    fn kind(&self) -> TerminalKind {
        TerminalKind::Screen
    }

    fn commands(&self, entry: &Path, args: &[OsString], config: &SessionConfig) -> Vec<Command> {
        let split = match config.split_dir {
            SplitDir::Horizontal => screen(&["split"]),
            SplitDir::Vertical => screen(&["split", "-v"]),
        };
        let mut chdir = screen(&["chdir"]);
        chdir.arg(&config.cwd);
        let mut window = screen(&["screen"]);
        window.args(env_wrapped(entry, args, config));

        vec![split, screen(&["focus"]), chdir, window, screen(&["focus"])]
    }
}
