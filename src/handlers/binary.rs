//! Metadata summary for content nothing else can draw.

use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use super::pager::{page, PagerSource};
use super::PreviewContext;

/// Print a header followed by `mediainfo`, `exiftool` or `file` output, or
/// a built-in size/mtime/permissions summary when none is installed.
pub fn render(ctx: &PreviewContext, out: &mut dyn Write, path: &Path) -> io::Result<()> {
    let mut text = header(path);
    match tool_summary(ctx, path) {
        Some(summary) => text.push_str(&summary),
        None => text.push_str(&builtin_summary(path)?),
    }
    page(ctx, out, PagerSource::Text(text))
}

fn header(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    format!("-------- {} --------\n", name)
}

fn tool_summary(ctx: &PreviewContext, path: &Path) -> Option<String> {
    for (program, args) in [("mediainfo", &[][..]), ("exiftool", &[][..]), ("file", &["-b"][..])] {
        let Some(mut cmd) = ctx.tools.command(program) else {
            continue;
        };
        let output = match cmd.args(args).arg(path).stdin(Stdio::null()).stderr(Stdio::null()).output() {
            Ok(output) => output,
            Err(e) => {
                log::debug!("{} failed on {}: {}", program, path.display(), e);
                continue;
            }
        };
        if output.status.success() && !output.stdout.is_empty() {
            return Some(String::from_utf8_lossy(&output.stdout).into_owned());
        }
    }
    None
}

fn builtin_summary(path: &Path) -> io::Result<String> {
    let meta = std::fs::metadata(path)?;
    let mut text = format!("Size:     {}\n", format_size(meta.len()));
    if let Ok(modified) = meta.modified() {
        text.push_str(&format!("Modified: {}\n", format_age(modified)));
    }
    text.push_str(&format!("Mode:     {}\n", format_mode(meta.permissions().mode())));
    Ok(text)
}

/// Format bytes as human-readable string (KB, MB, GB)
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn format_age(modified: SystemTime) -> String {
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    match age {
        0..=59 => format!("{} s ago", age),
        60..=3599 => format!("{} min ago", age / 60),
        3600..=86_399 => format!("{} h ago", age / 3600),
        _ => format!("{} days ago", age / 86_400),
    }
}

/// `ls -l` style permission string.
fn format_mode(mode: u32) -> String {
    let kind = match mode & libc::S_IFMT as u32 {
        m if m == libc::S_IFDIR as u32 => 'd',
        m if m == libc::S_IFLNK as u32 => 'l',
        _ => '-',
    };
    let mut s = String::with_capacity(10);
    s.push(kind);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    s
}
