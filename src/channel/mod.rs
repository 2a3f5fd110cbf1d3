//! Named conduits between the browser and the preview session.
//!
//! - [`hover`] - line-oriented selection events, browser to renderer
//! - [`control`] - session-active byte and the one-shot preview-control byte
//! - [`fifo`] - FIFO creation and non-blocking writer open

mod control;
mod fifo;
mod hover;

pub use control::{read_preview_control, ControlChannel};
pub(crate) use fifo::clear_nonblocking;
pub use fifo::{create_fifo, open_writer, remove_fifo, WriterOpen};
pub use hover::{HoverChannel, HoverEvent, CLOSE_TOKEN};

/// Errors from conduit operations that the caller may want to see.
///
/// Most conduit failures mean "feature disabled" and never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("failed to create fifo {path}: {source}")]
    Create {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("fifo I/O error: {0}")]
    Io(#[from] std::io::Error),
}
