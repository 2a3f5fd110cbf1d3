//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;

pub use args::{Args, CacheAction, Command, ConfigAction, ToggleArgs};
pub use commands::{handle_cache_action, handle_config_action, run_job, run_render, run_toggle, CliError};
pub use enums::{Host, Split};
