//! Preview supervisor: turns a session on or off.
//!
//! `toggle` stops a live session if one is recorded in the runtime
//! directory. Otherwise it detects the host environment, snapshots a
//! [`SessionConfig`] and opens the engine through a multiplexer adapter.

use std::ffi::OsString;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::channel::ControlChannel;
use crate::config::Settings;
use crate::multiplexer::{adapter_for, HostInfo, LaunchError, LaunchOutcome};
use crate::process::{read_recorded, ProcessError, Role};
use crate::session::{Emulator, SessionConfig, SplitDir, TerminalKind};
use crate::terminal::PaneSize;

/// Error from a toggle.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("no hover channel configured; set NNN_FIFO or channels.hover")]
    NoHoverFifo,

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl SupervisorError {
    /// Errors the user fixes in their setup rather than transient failures.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            SupervisorError::NoHoverFifo | SupervisorError::Launch(LaunchError::NoTerminal)
        )
    }
}

/// What a toggle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A live session was stopped.
    Stopped { pid: u32 },
    /// A session (or an external viewer) was opened.
    Started {
        kind: TerminalKind,
        outcome: LaunchOutcome,
    },
}

/// Read access to the environment the supervisor runs in.
pub trait EnvProbe {
    fn var(&self, key: &str) -> Option<String>;

    /// Whether a tmux server answers for the current client.
    fn tmux_responds(&self) -> bool;

    fn path_exists(&self, path: &Path) -> bool;

    /// Size of the terminal the browser runs in.
    fn terminal_size(&self) -> PaneSize;

    fn cwd(&self) -> PathBuf;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl EnvProbe for SystemProbe {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn tmux_responds(&self) -> bool {
        if self.var("TMUX").is_none() {
            return false;
        }
        Command::new("tmux")
            .args(["display-message", "-p", "#{pane_id}"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn terminal_size(&self) -> PaneSize {
        PaneSize::detect()
    }

    fn cwd(&self) -> PathBuf {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
    }
}

/// Pick the host. Live capabilities win, then session markers, then the
/// configured kind, then the external terminal.
pub fn detect(probe: &impl EnvProbe, configured: Option<TerminalKind>) -> TerminalKind {
    if probe.tmux_responds() {
        TerminalKind::Tmux
    } else if kitty_socket(probe).is_some() {
        TerminalKind::Kitty
    } else if probe.var("WEZTERM_PANE").is_some() {
        TerminalKind::Wezterm
    } else if probe.var("ZELLIJ").is_some() {
        TerminalKind::Zellij
    } else if probe.var("STY").is_some() {
        TerminalKind::Screen
    } else {
        configured.unwrap_or(TerminalKind::External)
    }
}

/// The kitty remote-control address, if its socket is present. Abstract
/// sockets (`@name`) have no filesystem entry and are taken as present.
fn kitty_socket(probe: &impl EnvProbe) -> Option<String> {
    let listen_on = probe.var("KITTY_LISTEN_ON")?;
    let socket = listen_on.strip_prefix("unix:").unwrap_or(&listen_on);
    if socket.starts_with('@') || probe.path_exists(Path::new(socket)) {
        Some(listen_on)
    } else {
        None
    }
}

/// An explicit direction always wins. Otherwise a tall terminal stacks the
/// preview below and a wide one puts it beside.
pub fn choose_split(explicit: Option<SplitDir>, size: PaneSize) -> SplitDir {
    match explicit {
        Some(dir) => dir,
        None if u32::from(size.rows) * 2 > u32::from(size.cols) => SplitDir::Horizontal,
        None => SplitDir::Vertical,
    }
}

/// Starts and stops preview sessions.
pub struct Supervisor<P: EnvProbe> {
    settings: Settings,
    probe: P,
    entry: PathBuf,
}

impl<P: EnvProbe> Supervisor<P> {
    /// `entry` is the executable the new pane runs as `entry render [PATH]`.
    pub fn new(settings: Settings, probe: P, entry: PathBuf) -> Self {
        Self { settings, probe, entry }
    }

    pub fn toggle(&self, path: Option<PathBuf>) -> Result<ToggleOutcome, SupervisorError> {
        let control = ControlChannel::new(self.settings.control_fifo.clone());

        if let Some(mut session) = read_recorded(&self.settings.runtime_dir, Role::Session) {
            let pid = session.pid();
            log::info!("Stopping preview session (pid {})", pid);
            session.terminate()?;
            control.signal(false);
            return Ok(ToggleOutcome::Stopped { pid });
        }

        let kind = detect(&self.probe, self.settings.terminal_kind);
        let host = HostInfo {
            kitty_listen_on: self.probe.var("KITTY_LISTEN_ON"),
            wezterm_pane: self.probe.var("WEZTERM_PANE"),
            external_terminal: self.settings.external_terminal.clone(),
            external_viewer: self.settings.external_viewer.clone(),
            target: path.clone(),
        };
        let adapter = adapter_for(kind, &host)?;
        let config = self.session_config(kind);

        let mut args = vec![OsString::from("render")];
        if let Some(path) = &path {
            args.push(path.clone().into_os_string());
        }
        // An external viewer does not need the engine or its channels.
        let viewer_only = kind == TerminalKind::External && host.external_viewer.is_some() && path.is_some();
        if !viewer_only && config.hover_fifo.is_none() {
            return Err(SupervisorError::NoHoverFifo);
        }

        log::info!("Opening preview pane via {}", kind);
        let outcome = adapter.open(&self.entry, &args, &config)?;
        if !matches!(outcome, LaunchOutcome::Viewer { .. }) {
            control.signal(true);
        }
        Ok(ToggleOutcome::Started { kind, outcome })
    }

    /// Snapshot the session for a pane opened in `kind`.
    pub fn session_config(&self, kind: TerminalKind) -> SessionConfig {
        let s = &self.settings;
        let cwd = self.probe.cwd();
        SessionConfig {
            split_dir: choose_split(s.split_dir, self.probe.terminal_size()),
            split_size_pct: s.split_size_pct,
            terminal_kind: kind,
            emulator: Emulator::detect(|k| self.probe.var(k)),
            pager_cmd: s.pager_cmd.clone(),
            pager_theme: s.pager_theme.clone(),
            pager_style: s.pager_style.clone(),
            preview_width: s.preview_width,
            preview_height: s.preview_height,
            cache_dir: s.cache_dir.clone(),
            image_prog: s.image_prog.clone(),
            video_backend: s.video_backend.clone(),
            path: self.probe.var("PATH").map(OsString::from).unwrap_or_default(),
            runtime_dir: s.runtime_dir.clone(),
            hover_fifo: s.hover_fifo.as_ref().map(|p| absolute(&cwd, p)),
            control_fifo: s.control_fifo.as_ref().map(|p| absolute(&cwd, p)),
            preview_control_fifo: s.preview_control_fifo.as_ref().map(|p| absolute(&cwd, p)),
            offset_file: s.offset_file.as_ref().map(|p| absolute(&cwd, p)),
            cwd,
        }
    }
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Show a misconfiguration once. On a terminal the message waits for Enter
/// so it is not lost when the browser redraws.
pub fn report_misconfiguration(
    err: &SupervisorError,
    input: &mut impl BufRead,
    output: &mut impl Write,
    interactive: bool,
) -> io::Result<()> {
    writeln!(output, "preview-pane: {}", err)?;
    if interactive {
        write!(output, "Press Enter to continue...")?;
        output.flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Overrides};
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeProbe {
        vars: HashMap<String, String>,
        tmux: bool,
        paths: Vec<PathBuf>,
        size: Option<PaneSize>,
    }

    impl FakeProbe {
        fn with(mut self, key: &str, value: &str) -> Self {
            self.vars.insert(key.into(), value.into());
            self
        }
    }

    impl EnvProbe for FakeProbe {
        fn var(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }

        fn tmux_responds(&self) -> bool {
            self.tmux
        }

        fn path_exists(&self, path: &Path) -> bool {
            self.paths.iter().any(|p| p == path)
        }

        fn terminal_size(&self) -> PaneSize {
            self.size.unwrap_or_default()
        }

        fn cwd(&self) -> PathBuf {
            PathBuf::from("/home/me")
        }
    }

    fn settings(dir: &Path) -> Settings {
        let mut s = Settings::resolve(&Config::default(), &Overrides::default(), |_| None).unwrap();
        s.runtime_dir = dir.join("run");
        s.cache_dir = dir.join("cache");
        s
    }

    #[test]
    fn test_live_tmux_wins_over_everything() {
        let probe = FakeProbe {
            tmux: true,
            ..FakeProbe::default()
        }
        .with("STY", "1234.pts-0")
        .with("KITTY_LISTEN_ON", "unix:@kitty");
        assert_eq!(detect(&probe, Some(TerminalKind::Zellij)), TerminalKind::Tmux);
    }

    #[test]
    fn test_kitty_socket_must_exist() {
        let probe = FakeProbe::default().with("KITTY_LISTEN_ON", "unix:/tmp/kitty-sock");
        assert_eq!(detect(&probe, None), TerminalKind::External);

        let probe = FakeProbe {
            paths: vec![PathBuf::from("/tmp/kitty-sock")],
            ..FakeProbe::default()
        }
        .with("KITTY_LISTEN_ON", "unix:/tmp/kitty-sock");
        assert_eq!(detect(&probe, None), TerminalKind::Kitty);

        let probe = FakeProbe::default().with("KITTY_LISTEN_ON", "unix:@mykitty");
        assert_eq!(detect(&probe, None), TerminalKind::Kitty);
    }

    #[test]
    fn test_markers_then_override_then_external() {
        assert_eq!(detect(&FakeProbe::default().with("WEZTERM_PANE", "0"), None), TerminalKind::Wezterm);
        assert_eq!(detect(&FakeProbe::default().with("ZELLIJ", "0"), None), TerminalKind::Zellij);
        assert_eq!(detect(&FakeProbe::default().with("STY", "1.x"), None), TerminalKind::Screen);
        assert_eq!(detect(&FakeProbe::default(), Some(TerminalKind::Kitty)), TerminalKind::Kitty);
        assert_eq!(detect(&FakeProbe::default(), None), TerminalKind::External);
    }

    #[test]
    fn test_split_heuristic_and_override() {
        let tall = PaneSize { cols: 80, rows: 50 };
        let wide = PaneSize { cols: 200, rows: 50 };
        assert_eq!(choose_split(None, tall), SplitDir::Horizontal);
        assert_eq!(choose_split(None, wide), SplitDir::Vertical);
        assert_eq!(choose_split(Some(SplitDir::Vertical), tall), SplitDir::Vertical);
        assert_eq!(choose_split(Some(SplitDir::Horizontal), wide), SplitDir::Horizontal);
    }

    #[test]
    fn test_session_config_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut s = settings(dir.path());
        s.hover_fifo = Some(PathBuf::from("nnn.fifo"));
        s.split_dir = None;
        let probe = FakeProbe {
            size: Some(PaneSize { cols: 100, rows: 60 }),
            ..FakeProbe::default()
        }
        .with("PATH", "/usr/bin")
        .with("TERM_PROGRAM", "WezTerm");
        let sup = Supervisor::new(s, probe, PathBuf::from("/bin/preview-pane"));

        let config = sup.session_config(TerminalKind::Wezterm);
        assert_eq!(config.split_dir, SplitDir::Horizontal);
        assert_eq!(config.emulator, Emulator::Wezterm);
        assert_eq!(config.hover_fifo, Some(PathBuf::from("/home/me/nnn.fifo")));
        assert_eq!(config.path, OsString::from("/usr/bin"));
        assert_eq!(config.terminal_kind, TerminalKind::Wezterm);
    }

    #[test]
    fn test_toggle_without_hover_is_misconfiguration() {
        let dir = TempDir::new().unwrap();
        let mut s = settings(dir.path());
        s.external_terminal = Some("xterm".into());
        let sup = Supervisor::new(s, FakeProbe::default(), PathBuf::from("/bin/preview-pane"));

        let err = sup.toggle(None).unwrap_err();
        assert!(matches!(err, SupervisorError::NoHoverFifo));
        assert!(err.is_misconfiguration());
    }

    #[test]
    fn test_toggle_without_terminal_is_misconfiguration() {
        let dir = TempDir::new().unwrap();
        let mut s = settings(dir.path());
        s.hover_fifo = Some(dir.path().join("hover"));
        s.external_terminal = None;
        let sup = Supervisor::new(s, FakeProbe::default(), PathBuf::from("/bin/preview-pane"));

        let err = sup.toggle(None).unwrap_err();
        assert!(err.is_misconfiguration());
    }

    #[test]
    fn test_toggle_stops_recorded_session() {
        let dir = TempDir::new().unwrap();
        let s = settings(dir.path());
        let control = dir.path().join("control");
        std::fs::write(&control, "").unwrap();
        let mut s = s;
        s.control_fifo = Some(control.clone());

        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid_file = crate::process::ProcessRegistry::new(s.runtime_dir.clone()).pid_file(Role::Session);
        std::fs::create_dir_all(pid_file.parent().unwrap()).unwrap();
        std::fs::write(&pid_file, child.id().to_string()).unwrap();

        // Reap the sleeper as soon as it is signalled so it does not linger
        // as a zombie that still answers kill(pid, 0).
        let waiter = std::thread::spawn(move || child.wait().unwrap());
        let sup = Supervisor::new(s, FakeProbe::default(), PathBuf::from("/bin/preview-pane"));
        let outcome = sup.toggle(None).unwrap();

        assert!(matches!(outcome, ToggleOutcome::Stopped { .. }));
        assert!(!waiter.join().unwrap().success());
        assert_eq!(std::fs::read_to_string(&control).unwrap(), "0");
    }

    #[test]
    fn test_report_waits_for_enter_when_interactive() {
        let mut input = io::Cursor::new(b"\n".to_vec());
        let mut output = Vec::new();
        report_misconfiguration(&SupervisorError::NoHoverFifo, &mut input, &mut output, true).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("NNN_FIFO"));
        assert!(text.ends_with("Press Enter to continue..."));
        assert_eq!(input.position(), 1);
    }
}
