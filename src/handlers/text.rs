//! Text-like previews: manual pages, markup, JSON, archive listings and
//! plain text. Each class has a preference list of renderers; the first
//! installed one is piped through the pager.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::Path;

use super::pager::{page, PagerSource};
use super::{binary, PreviewContext};
use crate::classify::ContentClass;

/// One way of turning a file into terminal text.
struct Renderer {
    program: &'static str,
    args: Vec<OsString>,
    env: Vec<(&'static str, String)>,
}

impl Renderer {
    fn new(program: &'static str, args: &[&str], path: &Path) -> Self {
        let mut argv: Vec<OsString> = args.iter().map(OsString::from).collect();
        argv.push(path.as_os_str().to_owned());
        Self {
            program,
            args: argv,
            env: Vec::new(),
        }
    }

    fn env(mut self, key: &'static str, value: String) -> Self {
        self.env.push((key, value));
        self
    }
}

fn renderers(ctx: &PreviewContext, path: &Path, class: ContentClass) -> Vec<Renderer> {
    let cols = ctx.size.cols.to_string();
    match class {
        ContentClass::Troff => vec![Renderer::new("man", &["-l"], path).env("MANWIDTH", cols)],
        ContentClass::Markdown => vec![
            Renderer::new("glow", &["-s", "dark", "-w", &cols], path),
            Renderer::new(
                "lowdown",
                &["-Tterm", &format!("--term-width={}", cols), &format!("--term-column={}", cols)],
                path,
            ),
        ],
        ContentClass::Html => vec![
            Renderer::new("w3m", &["-dump", "-cols", &cols], path),
            Renderer::new("lynx", &["-dump", &format!("-width={}", cols)], path),
            Renderer::new("elinks", &["-dump", "-dump-width", &cols], path),
        ],
        ContentClass::Json => vec![Renderer::new("jq", &["--color-output", "."], path)],
        ContentClass::Archive => vec![
            Renderer::new("bsdtar", &["--list", "--file"], path),
            Renderer::new("atool", &["--list", "--"], path),
            Renderer::new("unzip", &["-l"], path),
            Renderer::new("tar", &["-tvf"], path),
        ],
        _ => vec![bat(ctx, path)],
    }
}

fn bat(ctx: &PreviewContext, path: &Path) -> Renderer {
    let width = format!("--terminal-width={}", ctx.size.cols);
    let theme = ctx.config.pager_theme.as_deref().map(|t| format!("--theme={}", t));
    let style = format!("--style={}", ctx.config.pager_style.as_deref().unwrap_or("numbers"));

    let mut args = vec!["--color=always", "--paging=never", "--wrap=auto", width.as_str(), style.as_str()];
    if let Some(theme) = &theme {
        args.push(theme.as_str());
    }
    args.push("--");
    Renderer::new("bat", &args, path)
}

/// Render a text-like class. Plain text falls back to the raw file; an
/// archive nothing can list falls back to the metadata summary.
pub fn render(ctx: &PreviewContext, out: &mut dyn Write, path: &Path, class: ContentClass) -> io::Result<()> {
    for renderer in renderers(ctx, path, class) {
        let Some(mut cmd) = ctx.tools.command(renderer.program) else {
            continue;
        };
        cmd.args(&renderer.args).envs(renderer.env.iter().map(|(k, v)| (*k, v.as_str())));
        log::debug!("Text renderer {} for {}", renderer.program, path.display());
        return page(ctx, out, PagerSource::Command(cmd));
    }

    match class {
        ContentClass::Archive => binary::render(ctx, out, path),
        _ => page(ctx, out, PagerSource::File(path)),
    }
}
