//! Pager sink for text-like previews.
//!
//! With a configured `pager_cmd` the producer output is piped into that
//! program. Otherwise the built-in pager copies output to the pane and stops
//! once the pane is full.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use super::PreviewContext;
use crate::tools::split_command;

/// What to page.
pub enum PagerSource<'a> {
    /// A producer whose stdout is paged.
    Command(Command),
    /// A file read as-is.
    File(&'a Path),
    /// Text generated in-process.
    Text(String),
}

/// Page `source` into the pane.
pub fn page(ctx: &PreviewContext, out: &mut dyn Write, source: PagerSource<'_>) -> io::Result<()> {
    match ctx.config.pager_cmd.as_deref().and_then(split_command) {
        Some((program, args)) => match ctx.tools.command(&program) {
            Some(mut pager) => {
                pager.args(args);
                external(pager, source)
            }
            None => {
                log::warn!("Pager '{}' not found, using built-in pager", program);
                builtin(out, source, ctx.size.rows as usize)
            }
        },
        None => builtin(out, source, ctx.size.rows as usize),
    }
}

fn builtin(out: &mut dyn Write, source: PagerSource<'_>, rows: usize) -> io::Result<()> {
    match source {
        PagerSource::Command(mut cmd) => {
            let mut child = cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::null()).spawn()?;
            let result = match child.stdout.take() {
                Some(stdout) => copy_lines(BufReader::new(stdout), out, rows),
                None => Ok(()),
            };
            // The producer may still be writing past the last visible row.
            let _ = child.kill();
            let _ = child.wait();
            result
        }
        PagerSource::File(path) => copy_lines(BufReader::new(File::open(path)?), out, rows),
        PagerSource::Text(text) => copy_lines(text.as_bytes(), out, rows),
    }
}

/// Copy at most `rows` lines. Invalid UTF-8 is passed through untouched.
fn copy_lines(mut reader: impl BufRead, out: &mut dyn Write, rows: usize) -> io::Result<()> {
    let mut line = Vec::new();
    let mut written = 0;
    while written < rows {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        match out.write_all(&line) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => break,
            Err(e) => return Err(e),
        }
        written += 1;
    }
    out.flush()
}

fn external(mut pager: Command, source: PagerSource<'_>) -> io::Result<()> {
    match source {
        PagerSource::Command(mut producer) => {
            let mut producer = producer.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::null()).spawn()?;
            let stdin = match producer.stdout.take() {
                Some(stdout) => Stdio::from(stdout),
                None => Stdio::null(),
            };
            let status = pager.stdin(stdin).status();
            let _ = producer.kill();
            let _ = producer.wait();
            status.map(|_| ())
        }
        PagerSource::File(path) => pager.stdin(File::open(path)?).status().map(|_| ()),
        PagerSource::Text(text) => {
            let mut child = pager.stdin(Stdio::piped()).spawn()?;
            if let Some(mut stdin) = child.stdin.take() {
                // The pager may quit before reading everything.
                let _ = stdin.write_all(text.as_bytes());
            }
            child.wait().map(|_| ())
        }
    }
}
