//! Process registry - role-tracked background processes
//!
//! # Structure
//!
//! - [`error`] - Error types for process operations
//! - [`handle`] - A single tracked process and its terminate-and-wait
//! - [`registry`] - One live handle per role, mirrored to pid files

mod error;
mod handle;
mod registry;

pub use error::ProcessError;
pub use handle::{pid_alive, ProcessHandle, Role, Termination, TERMINATE_GRACE};
pub use registry::{read_recorded, ProcessRegistry};
