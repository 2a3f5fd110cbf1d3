//! Video playback and frame-loop animation.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use super::PreviewContext;
use crate::display;
use crate::session::{Emulator, TerminalKind};
use crate::terminal::clear_screen;
use crate::tools::split_command;

/// Delay between frames of a decomposed animation.
pub const FRAME_DELAY: Duration = Duration::from_millis(100);

/// Play `path` with the configured video backend. Returns `false` when no
/// backend is configured or installed, so the caller can fall back.
pub fn play(ctx: &PreviewContext, path: &Path) -> bool {
    let Some((program, mut args)) = ctx.config.video_backend.as_deref().and_then(split_command) else {
        return false;
    };
    let Some(mut cmd) = ctx.tools.command(&program) else {
        log::info!("Video backend {} is not installed", program);
        return false;
    };

    if program == "mpv" && args.is_empty() {
        args = mpv_args(ctx);
    }
    log::debug!("Playing {} with {}", path.display(), program);
    match cmd.args(&args).arg(path).stdin(Stdio::null()).status() {
        Ok(status) => {
            if !status.success() {
                log::info!("{} exited with {}", program, status);
            }
            true
        }
        Err(e) => {
            log::info!("{} failed to start: {}", program, e);
            false
        }
    }
}

fn mpv_args(ctx: &PreviewContext) -> Vec<String> {
    let kitty_native = ctx.config.emulator == Emulator::Kitty && ctx.config.terminal_kind != TerminalKind::Tmux;
    let vo = if kitty_native { "--vo=kitty" } else { "--vo=tct" };
    ["--really-quiet", "--loop-file=inf", "--no-audio", vo]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Loop over the frames in `dir`, clearing and drawing each in turn. Runs
/// until the job is cancelled; returns `Ok(false)` if the first frame could
/// not be drawn at all.
pub fn loop_frames(ctx: &PreviewContext, out: &mut dyn Write, dir: &Path) -> io::Result<bool> {
    let frames = sorted_frames(dir)?;
    if frames.is_empty() {
        return Ok(false);
    }
    loop_over(&frames, |frame| {
        clear_screen(out)?;
        Ok(display::show_image(ctx, out, frame))
    })
}

fn loop_over(frames: &[PathBuf], mut draw: impl FnMut(&Path) -> io::Result<bool>) -> io::Result<bool> {
    let mut first = true;
    loop {
        for frame in frames {
            let drawn = draw(frame)?;
            if first && !drawn {
                return Ok(false);
            }
            first = false;
            std::thread::sleep(FRAME_DELAY);
        }
        // A single frame never changes; draw it once.
        if frames.len() == 1 {
            return Ok(true);
        }
    }
}

/// Frames in playback order: by the number in `frame-<n>`, with anything
/// unnumbered after them by name.
fn sorted_frames(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    frames.sort_by(|a, b| {
        let key = |p: &PathBuf| frame_index(p).unwrap_or(u64::MAX);
        key(a).cmp(&key(b)).then_with(|| a.cmp(b))
    });
    Ok(frames)
}

fn frame_index(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.strip_prefix("frame-")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::context;
    use crate::tools::tests::install_script;
    use crate::tools::Toolbox;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_play_without_backend() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        assert!(!play(&ctx, Path::new("/v/clip.mp4")));
    }

    #[test]
    fn test_play_uninstalled_backend() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(dir.path());
        ctx.config.video_backend = Some("mpv".into());
        assert!(!play(&ctx, Path::new("/v/clip.mp4")));
    }

    #[test]
    fn test_mpv_gets_terminal_output_args() {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let args_file = dir.path().join("args");
        install_script(&bin, "mpv", &format!(r#"printf '%s\n' "$@" > '{}'"#, args_file.display()));
        let mut ctx = context(dir.path());
        ctx.tools = Toolbox::new(bin.as_os_str());
        ctx.config.video_backend = Some("mpv".into());

        assert!(play(&ctx, Path::new("/v/clip.mp4")));
        let args = fs::read_to_string(&args_file).unwrap();
        assert!(args.contains("--vo=tct"));
        assert!(args.trim_end().ends_with("/v/clip.mp4"));
    }

    #[test]
    fn test_custom_backend_runs_with_its_args() {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let args_file = dir.path().join("args");
        install_script(&bin, "player", &format!(r#"echo "$@" > '{}'"#, args_file.display()));
        let mut ctx = context(dir.path());
        ctx.tools = Toolbox::new(bin.as_os_str());
        ctx.config.video_backend = Some("player --loop".into());

        assert!(play(&ctx, Path::new("/v/cat.gif")));
        assert_eq!(fs::read_to_string(&args_file).unwrap(), "--loop /v/cat.gif\n");
    }

    #[test]
    fn test_loop_stops_when_first_frame_fails() {
        let frames = vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")];
        let mut calls = 0;
        let shown = loop_over(&frames, |_| {
            calls += 1;
            Ok(false)
        })
        .unwrap();
        assert!(!shown);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_loop_cycles_frames_in_order() {
        let frames = vec![PathBuf::from("f0.jpg"), PathBuf::from("f1.jpg")];
        let mut seen = Vec::new();
        let err = loop_over(&frames, |frame| {
            seen.push(frame.to_path_buf());
            if seen.len() == 5 {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "stop"));
            }
            Ok(true)
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        assert_eq!(
            seen,
            vec!["f0.jpg", "f1.jpg", "f0.jpg", "f1.jpg", "f0.jpg"]
                .into_iter()
                .map(PathBuf::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_frames_ordered_by_index() {
        let dir = TempDir::new().unwrap();
        for name in ["frame-10000.jpg", "frame-9999.jpg", "frame-0002.jpg", "frame-10.jpg", "cover.jpg"] {
            fs::write(dir.path().join(name), b"f").unwrap();
        }
        let names: Vec<String> = sorted_frames(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            ["frame-0002.jpg", "frame-10.jpg", "frame-9999.jpg", "frame-10000.jpg", "cover.jpg"]
        );
    }

    #[test]
    fn test_empty_frame_dir() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let mut out = Vec::new();
        assert!(!loop_frames(&ctx, &mut out, dir.path()).unwrap());
    }
}
