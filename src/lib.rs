//! preview-pane library crate.
//!
//! A live preview pane for terminal file browsers: the supervisor opens a
//! pane through the host multiplexer, the engine follows hover events and
//! each selection is drawn by a short-lived render job.

#[cfg(not(unix))]
compile_error!("preview-pane relies on FIFOs, process groups and POSIX signals and only builds on Unix");

pub mod cache;
pub mod channel;
pub mod classify;
pub mod cli;
pub mod config;
pub mod display;
pub mod engine;
pub mod generate;
pub mod handlers;
pub mod logging;
pub mod multiplexer;
pub mod process;
pub mod session;
pub mod signals;
pub mod supervisor;
pub mod terminal;
pub mod tools;
