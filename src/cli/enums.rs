//! CLI enum types for split direction and host terminal options.

use clap::ValueEnum;

use crate::session::{SplitDir, TerminalKind};

/// Orientation of the divider between browser and preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Split {
    /// Preview below the browser
    #[value(alias = "h")]
    Horizontal,
    /// Preview beside the browser
    #[value(alias = "v")]
    Vertical,
}

impl From<Split> for SplitDir {
    fn from(s: Split) -> Self {
        match s {
            Split::Horizontal => SplitDir::Horizontal,
            Split::Vertical => SplitDir::Vertical,
        }
    }
}

/// Host that opens the preview pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Host {
    Tmux,
    Kitty,
    Wezterm,
    Zellij,
    Screen,
    External,
}

impl From<Host> for TerminalKind {
    fn from(h: Host) -> Self {
        match h {
            Host::Tmux => TerminalKind::Tmux,
            Host::Kitty => TerminalKind::Kitty,
            Host::Wezterm => TerminalKind::Wezterm,
            Host::Zellij => TerminalKind::Zellij,
            Host::Screen => TerminalKind::Screen,
            Host::External => TerminalKind::External,
        }
    }
}
