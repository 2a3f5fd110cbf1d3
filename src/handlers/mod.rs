//! Content handlers run inside a render job.
//!
//! [`render`] is the single dispatch point from a [`ContentClass`] to the
//! code that draws it. Every handler degrades: a missing tool means the next
//! one, and the last resort is the pager or the metadata summary.

pub mod animation;
pub mod binary;
pub mod directory;
pub mod pager;
pub mod text;

use std::io::{self, Write};
use std::path::Path;

use crate::cache::PreviewCache;
use crate::classify::{ContentClass, ImageKind};
use crate::display;
use crate::generate::Generator;
use crate::session::SessionConfig;
use crate::terminal::PaneSize;
use crate::tools::Toolbox;

/// Error surfaced by a render job.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("cannot preview {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl PreviewError {
    fn io(path: &Path, source: io::Error) -> Self {
        PreviewError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Everything a handler needs to draw one selection.
#[derive(Debug, Clone)]
pub struct PreviewContext {
    pub config: SessionConfig,
    pub tools: Toolbox,
    pub cache: PreviewCache,
    pub size: PaneSize,
}

impl PreviewContext {
    /// Build a context from the session snapshot, reading the pane size now.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_size(config, PaneSize::detect())
    }

    pub fn with_size(config: SessionConfig, size: PaneSize) -> Self {
        Self {
            tools: Toolbox::new(config.path.clone()),
            cache: PreviewCache::new(config.cache_dir.clone()),
            size,
            config,
        }
    }

    pub fn generator(&self) -> Generator<'_> {
        Generator::new(
            &self.cache,
            &self.tools,
            self.config.preview_width,
            self.config.preview_height,
        )
    }
}

/// Draw `path` as `class`. Blocks until the preview is complete; animated
/// previews never complete and run until the job is cancelled.
pub fn render(
    ctx: &PreviewContext,
    out: &mut dyn Write,
    path: &Path,
    class: ContentClass,
) -> Result<(), PreviewError> {
    log::debug!("Rendering {} as {}", path.display(), class);
    let result = match class {
        ContentClass::Directory => directory::render(ctx, out, path),
        ContentClass::Troff
        | ContentClass::Markdown
        | ContentClass::Html
        | ContentClass::Json
        | ContentClass::Archive
        | ContentClass::Text => text::render(ctx, out, path, class),
        ContentClass::Binary => binary::render(ctx, out, path),
        ContentClass::Image(ImageKind::Jpeg) => show_or_summarize(ctx, out, path, path),
        ContentClass::Gif => render_gif(ctx, out, path),
        ContentClass::Video if animation::play(ctx, path) => Ok(()),
        _ => render_generated(ctx, out, path, class),
    };
    result.map_err(|e| PreviewError::io(path, e))
}

fn render_gif(ctx: &PreviewContext, out: &mut dyn Write, path: &Path) -> io::Result<()> {
    if animation::play(ctx, path) {
        return Ok(());
    }
    if let Some(frames) = ctx.generator().generate_frames(path) {
        if animation::loop_frames(ctx, out, &frames)? {
            return Ok(());
        }
    }
    render_generated(ctx, out, path, ContentClass::Gif)
}

fn render_generated(
    ctx: &PreviewContext,
    out: &mut dyn Write,
    path: &Path,
    class: ContentClass,
) -> io::Result<()> {
    match ctx.generator().generate(class, path) {
        Some(artifact) => show_or_summarize(ctx, out, path, &artifact),
        None => binary::render(ctx, out, path),
    }
}

fn show_or_summarize(
    ctx: &PreviewContext,
    out: &mut dyn Write,
    source: &Path,
    image: &Path,
) -> io::Result<()> {
    if display::show_image(ctx, out, image) {
        Ok(())
    } else {
        binary::render(ctx, out, source)
    }
}
