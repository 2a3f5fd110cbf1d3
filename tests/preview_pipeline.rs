//! Integration tests for classification, cached generation and the host
//! commands that open the pane.

use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use preview_pane::classify::{classify, ContentClass, FileFacts};
use preview_pane::handlers::{self, PreviewContext};
use preview_pane::multiplexer::{adapter_for, HostInfo};
use preview_pane::session::{Emulator, SessionConfig, SplitDir, TerminalKind};
use preview_pane::terminal::PaneSize;
use preview_pane::tools::Toolbox;

fn session(dir: &Path, bin: &Path) -> SessionConfig {
    SessionConfig {
        split_dir: SplitDir::Horizontal,
        split_size_pct: 40,
        terminal_kind: TerminalKind::External,
        emulator: Emulator::Other,
        pager_cmd: None,
        pager_theme: None,
        pager_style: None,
        preview_width: 800,
        preview_height: 600,
        cache_dir: dir.join("cache"),
        image_prog: None,
        video_backend: None,
        cwd: dir.to_path_buf(),
        path: OsString::from(bin),
        runtime_dir: dir.join("run"),
        hover_fifo: Some(dir.join("hover")),
        control_fifo: None,
        preview_control_fifo: None,
        offset_file: None,
    }
}

fn install_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\nPATH=\"$PATH:/usr/bin:/bin\"\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn argv(cmd: &Command) -> Vec<String> {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_pdf_thumbnail_generated_once_across_selections() {
    let dir = TempDir::new().unwrap();
    let bin = dir.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    let counter = dir.path().join("calls");
    install_script(
        &bin,
        "pdftoppm",
        &format!(r#"echo x >> '{}'; for a; do last=$a; done; printf jpg > "$last.jpg""#, counter.display()),
    );
    let report = dir.path().join("report.pdf");
    fs::write(&report, b"%PDF-1.4\n").unwrap();

    let ctx = PreviewContext::with_size(session(dir.path(), &bin), PaneSize { cols: 80, rows: 24 });
    for _ in 0..2 {
        let mut out = Vec::new();
        handlers::render(&ctx, &mut out, &report, ContentClass::Pdf).unwrap();
        assert!(!out.is_empty());
    }

    assert_eq!(fs::read_to_string(&counter).unwrap().lines().count(), 1);
    assert!(ctx.cache.total_size_bytes().unwrap() > 0);
}

#[test]
fn test_classification_by_extension_without_tools() {
    let dir = TempDir::new().unwrap();
    let tools = Toolbox::new(dir.path().join("no-bin").into_os_string());
    // Without file(1) a NUL byte is what marks content as binary.
    let cases: [(&str, &[u8], &str); 6] = [
        ("a.jpg", b"\xff\xd8\x00", "image-jpeg"),
        ("b.mp4", b"\x00\x00\x00\x18ftyp", "video"),
        ("c.md", b"# title\n", "markdown"),
        ("d.json", b"{}\n", "json"),
        ("e.docx", b"PK\x03\x04\x00", "office"),
        ("fake.jpg", b"just text\n", "text"),
    ];
    for (name, bytes, expected) in cases {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        let class = classify(&FileFacts::probe(&path, &tools));
        assert_eq!(class.as_str(), expected, "{}", name);
    }
    assert_eq!(classify(&FileFacts::probe(dir.path(), &tools)), ContentClass::Directory);
}

#[test]
fn test_directory_listing_without_tools() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("file.txt"), "x").unwrap();
    let ctx = PreviewContext::with_size(
        session(dir.path(), &dir.path().join("no-bin")),
        PaneSize { cols: 80, rows: 24 },
    );

    let mut out = Vec::new();
    handlers::render(&ctx, &mut out, dir.path(), ContentClass::Directory).unwrap();
    let text = String::from_utf8(out).unwrap();
    let sub = text.find("sub/").unwrap();
    let file = text.find("file.txt").unwrap();
    assert!(sub < file);
}

#[test]
fn test_tmux_split_carries_session_and_path_verbatim() {
    let dir = TempDir::new().unwrap();
    let config = session(dir.path(), Path::new("/usr/bin"));
    let entry = PathBuf::from("/opt/preview-pane");
    let args = vec![OsString::from("render"), OsString::from("it's a file.jpg")];

    let adapter = adapter_for(TerminalKind::Tmux, &HostInfo::default()).unwrap();
    let commands = adapter.commands(&entry, &args, &config);
    let argv = argv(&commands[0]);

    assert_eq!(&argv[..3], ["tmux", "split-window", "-d"]);
    assert!(argv.contains(&"-v".to_string()));
    assert!(argv.contains(&"40%".to_string()));
    assert_eq!(argv.last().unwrap(), "it's a file.jpg");
    assert!(argv
        .iter()
        .any(|a| a.starts_with("PREVIEW_PANE_HOVER_FIFO=") && a.ends_with("/hover")));
}

#[test]
fn test_external_terminal_without_program_is_refused() {
    let err = adapter_for(TerminalKind::External, &HostInfo::default()).err().unwrap();
    assert!(err.to_string().contains("no external terminal"));
}
