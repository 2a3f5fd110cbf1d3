//! Image backends and their selection order.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use super::overlay::{self, OverlayCommand};
use crate::handlers::PreviewContext;
use crate::process::{read_recorded, Role};
use crate::session::{Emulator, TerminalKind};
use crate::tools::split_command;

/// A way to put an image on the pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageBackend {
    /// kitty graphics protocol via `icat`.
    Kitty { program: &'static str },
    /// kitty graphics through tmux passthrough.
    KittyPassthrough { program: &'static str },
    /// `wezterm imgcat`.
    Wezterm,
    /// iTerm2's `imgcat`.
    Imgcat,
    /// Overlay listener fed through the session conduit.
    Overlay,
    /// User configured program, invoked with the image path.
    Custom { program: String, args: Vec<String> },
}

impl ImageBackend {
    pub fn name(&self) -> &str {
        match self {
            ImageBackend::Kitty { .. } => "kitty",
            ImageBackend::KittyPassthrough { .. } => "kitty-tmux",
            ImageBackend::Wezterm => "wezterm",
            ImageBackend::Imgcat => "imgcat",
            ImageBackend::Overlay => "overlay",
            ImageBackend::Custom { program, .. } => program,
        }
    }

    /// Draw `image`. Inline backends block until the drawing program exits.
    pub fn show(&self, ctx: &PreviewContext, out: &mut dyn Write, image: &Path) -> io::Result<()> {
        let (cols, rows) = (ctx.size.cols, ctx.size.rows);
        match self {
            ImageBackend::Kitty { program } | ImageBackend::KittyPassthrough { program } => {
                let mut args: Vec<OsString> = Vec::new();
                if *program == "kitty" {
                    args.push("+kitten".into());
                }
                args.push("icat".into());
                args.extend(
                    [
                        "--silent".to_string(),
                        "--scale-up".to_string(),
                        format!("--place={}x{}@0x0", cols, rows),
                        "--transfer-mode=stream".to_string(),
                        "--stdin=no".to_string(),
                    ]
                    .map(OsString::from),
                );
                if matches!(self, ImageBackend::KittyPassthrough { .. }) {
                    args.push("--passthrough=tmux".into());
                }
                args.push(image.as_os_str().to_owned());
                run(ctx.tools.command(program), &args)
            }
            ImageBackend::Wezterm => {
                let args: Vec<OsString> = vec![
                    "imgcat".into(),
                    "--width".into(),
                    cols.to_string().into(),
                    "--height".into(),
                    rows.to_string().into(),
                    image.as_os_str().to_owned(),
                ];
                run(ctx.tools.command("wezterm"), &args)
            }
            ImageBackend::Imgcat => run(ctx.tools.command("imgcat"), &[image.as_os_str().to_owned()]),
            ImageBackend::Overlay => {
                let offset = overlay::read_offset(ctx.config.offset_file.as_deref());
                let fifo = overlay::fifo_path(&ctx.config.runtime_dir);
                // The listener draws over the pane; leave no text beneath it.
                crate::terminal::clear_screen(out)?;
                if overlay::send(&fifo, &OverlayCommand::add(image, offset, cols, rows)) {
                    Ok(())
                } else {
                    Err(io::Error::new(io::ErrorKind::BrokenPipe, "overlay listener is gone"))
                }
            }
            ImageBackend::Custom { program, args } => {
                let mut argv: Vec<OsString> = args.iter().map(OsString::from).collect();
                argv.push(image.as_os_str().to_owned());
                run(ctx.tools.command(program), &argv)
            }
        }
    }
}

fn run(cmd: Option<Command>, args: &[OsString]) -> io::Result<()> {
    let mut cmd = cmd.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "image program missing"))?;
    let status = cmd.args(args).stdin(Stdio::null()).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::new(io::ErrorKind::Other, format!("exited with {}", status)))
    }
}

/// Every backend usable in this session, in preference order.
pub fn applicable(ctx: &PreviewContext) -> Vec<ImageBackend> {
    let config = &ctx.config;
    let tools = &ctx.tools;
    let mut backends = Vec::new();

    match config.emulator {
        Emulator::Kitty => {
            if let Some((program, _)) = tools.first(&["kitten", "kitty"]) {
                if config.terminal_kind == TerminalKind::Tmux {
                    backends.push(ImageBackend::KittyPassthrough { program });
                } else {
                    backends.push(ImageBackend::Kitty { program });
                }
            }
        }
        Emulator::Wezterm if tools.has("wezterm") => backends.push(ImageBackend::Wezterm),
        Emulator::Iterm2 if tools.has("imgcat") => backends.push(ImageBackend::Imgcat),
        _ => {}
    }

    let fifo = overlay::fifo_path(&config.runtime_dir);
    if read_recorded(&config.runtime_dir, Role::OverlayListener).is_some() && overlay::is_listening(&fifo) {
        backends.push(ImageBackend::Overlay);
    }

    if let Some((program, args)) = config.image_prog.as_deref().and_then(split_command) {
        if tools.has(&program) {
            backends.push(ImageBackend::Custom { program, args });
        }
    }
    backends
}
