//! Image display.
//!
//! - [`backend`] - inline graphics, overlay and custom viewers
//! - [`overlay`] - the overlay listener and its JSON command stream

pub mod backend;
pub mod overlay;

use std::io::Write;
use std::path::Path;

pub use backend::{applicable, ImageBackend};
pub use overlay::{OverlayCommand, OverlayLayer};

use crate::handlers::PreviewContext;

/// Draw `image` with the first backend that works. Returns `false` when no
/// backend could draw it, leaving the fallback to the caller.
pub fn show_image(ctx: &PreviewContext, out: &mut dyn Write, image: &Path) -> bool {
    for backend in applicable(ctx) {
        match backend.show(ctx, out, image) {
            Ok(()) => return true,
            Err(e) => log::info!("Image backend {} failed on {}: {}", backend.name(), image.display(), e),
        }
    }
    false
}
