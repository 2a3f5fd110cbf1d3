use std::io::{self, Write};
use std::path::Path;

use super::pager::{page, PagerSource};
use super::PreviewContext;

/// List a directory: icon listing, then `tree`, then `ls`, then a built-in
/// listing when none of them is installed.
pub fn render(ctx: &PreviewContext, out: &mut dyn Write, dir: &Path) -> io::Result<()> {
    let cols = ctx.size.cols.to_string();
    let candidates: [(&str, Vec<&str>); 4] = [
        (
            "eza",
            vec!["--icons=always", "--color=always", "--group-directories-first", "-G", "--width", &cols],
        ),
        ("exa", vec!["--icons", "--colour=always", "--group-directories-first", "-G"]),
        ("tree", vec!["-L", "1", "-C", "--dirsfirst", "--noreport"]),
        ("ls", vec!["--color=always", "--group-directories-first", "-F"]),
    ];

    for (program, args) in candidates {
        if let Some(mut cmd) = ctx.tools.command(program) {
            cmd.args(args).current_dir(dir);
            return page(ctx, out, PagerSource::Command(cmd));
        }
    }
    page(ctx, out, PagerSource::Text(builtin_listing(dir)?))
}

fn builtin_listing(dir: &Path) -> io::Result<String> {
    let mut entries: Vec<(bool, String)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            (is_dir, entry.file_name().to_string_lossy().into_owned())
        })
        .collect();
    // Directories first, then by name.
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut listing = String::new();
    for (is_dir, name) in entries {
        listing.push_str(&name);
        if is_dir {
            listing.push('/');
        }
        listing.push('\n');
    }
    Ok(listing)
}
