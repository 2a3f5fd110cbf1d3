//! CLI argument parsing with clap.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use super::enums::{Host, Split};
use crate::classify::ContentClass;
use crate::config::Overrides;

/// Live preview pane for terminal file browsers.
///
/// Run without a subcommand to toggle the preview pane for the hovered path.
#[derive(Parser, Debug)]
#[command(name = "preview-pane")]
#[command(version, about = "Live preview pane for terminal file browsers", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub toggle: ToggleArgs,

    /// Config file path
    #[arg(long, short, global = true, env = "PREVIEW_PANE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Flags for opening the pane.
#[derive(ClapArgs, Debug, Clone, Default, PartialEq, Eq)]
pub struct ToggleArgs {
    /// Path to preview first (usually the hovered entry)
    pub path: Option<PathBuf>,

    /// Split orientation (default: chosen from the terminal's shape)
    #[arg(long, short)]
    pub split: Option<Split>,

    /// Preview pane size as a percentage of the terminal
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=99))]
    pub size: Option<u8>,

    /// Host to open the pane in when none is detected
    #[arg(long, short)]
    pub terminal: Option<Host>,

    /// Hover channel the browser writes selections to
    #[arg(long)]
    pub hover: Option<PathBuf>,

    /// Control channel the browser reads session state from
    #[arg(long)]
    pub control: Option<PathBuf>,
}

impl ToggleArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            split: self.split.map(Into::into),
            split_size: self.size,
            terminal_kind: self.terminal.map(Into::into),
            hover: self.hover.clone(),
            control: self.control.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the preview pane, or close it if one is running
    Toggle(ToggleArgs),

    /// Run the preview engine in the current pane
    #[command(hide = true)]
    Render {
        /// Initial selection
        path: Option<PathBuf>,
    },

    /// Render one selection to stdout
    #[command(hide = true)]
    Job {
        #[arg(long)]
        class: ContentClass,
        path: PathBuf,
    },

    /// Preview cache management
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// Show the cache location and size
    Size,
    /// Delete every cached artifact
    Clear,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}
