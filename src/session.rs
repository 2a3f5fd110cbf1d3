//! Session configuration snapshot shared between the supervisor, the engine
//! and every job process.
//!
//! The snapshot is taken once when a session starts and travels to child
//! processes as `PREVIEW_PANE_*` environment variables. Nothing mutates it
//! after spawn.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Prefix of every environment variable carrying a session key.
pub const ENV_PREFIX: &str = "PREVIEW_PANE_";

/// Orientation of the divider between the browser and the preview pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitDir {
    /// Horizontal divider: the preview is stacked below the browser.
    Horizontal,
    /// Vertical divider: the preview sits beside the browser.
    #[default]
    Vertical,
}

impl SplitDir {
    pub fn as_str(self) -> &'static str {
        match self {
            SplitDir::Horizontal => "h",
            SplitDir::Vertical => "v",
        }
    }
}

impl FromStr for SplitDir {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" | "horizontal" => Ok(SplitDir::Horizontal),
            "v" | "vertical" => Ok(SplitDir::Vertical),
            other => Err(format!("unknown split direction '{}'", other)),
        }
    }
}

impl fmt::Display for SplitDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The host the preview pane is opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalKind {
    Tmux,
    Kitty,
    Wezterm,
    Zellij,
    Screen,
    /// A separate terminal emulator window.
    #[default]
    External,
}

impl TerminalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminalKind::Tmux => "tmux",
            TerminalKind::Kitty => "kitty",
            TerminalKind::Wezterm => "wezterm",
            TerminalKind::Zellij => "zellij",
            TerminalKind::Screen => "screen",
            TerminalKind::External => "external",
        }
    }
}

impl FromStr for TerminalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tmux" => Ok(TerminalKind::Tmux),
            "kitty" => Ok(TerminalKind::Kitty),
            "wezterm" => Ok(TerminalKind::Wezterm),
            "zellij" => Ok(TerminalKind::Zellij),
            "screen" => Ok(TerminalKind::Screen),
            "external" | "generic" => Ok(TerminalKind::External),
            other => Err(format!("unknown terminal kind '{}'", other)),
        }
    }
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal emulator drawing the pane, as far as image support goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Emulator {
    Kitty,
    Wezterm,
    Iterm2,
    #[default]
    Other,
}

impl Emulator {
    pub fn as_str(self) -> &'static str {
        match self {
            Emulator::Kitty => "kitty",
            Emulator::Wezterm => "wezterm",
            Emulator::Iterm2 => "iterm2",
            Emulator::Other => "other",
        }
    }

    /// Detect the emulator from the variables terminals export to children.
    pub fn detect(var: impl Fn(&str) -> Option<String>) -> Self {
        if var("KITTY_WINDOW_ID").is_some() || var("TERM").as_deref() == Some("xterm-kitty") {
            return Emulator::Kitty;
        }
        match var("TERM_PROGRAM").as_deref() {
            Some("WezTerm") => Emulator::Wezterm,
            Some("iTerm.app") => Emulator::Iterm2,
            _ => Emulator::Other,
        }
    }

    /// Whether the emulator can draw images inline without an overlay.
    pub fn has_inline_graphics(self) -> bool {
        !matches!(self, Emulator::Other)
    }
}

impl FromStr for Emulator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kitty" => Ok(Emulator::Kitty),
            "wezterm" => Ok(Emulator::Wezterm),
            "iterm2" => Ok(Emulator::Iterm2),
            "other" => Ok(Emulator::Other),
            other => Err(format!("unknown emulator '{}'", other)),
        }
    }
}

/// Immutable configuration for one preview session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub split_dir: SplitDir,
    pub split_size_pct: u8,
    pub terminal_kind: TerminalKind,
    pub emulator: Emulator,
    pub pager_cmd: Option<String>,
    pub pager_theme: Option<String>,
    pub pager_style: Option<String>,
    /// Target artifact width in pixels.
    pub preview_width: u32,
    /// Target artifact height in pixels.
    pub preview_height: u32,
    pub cache_dir: PathBuf,
    pub image_prog: Option<String>,
    pub video_backend: Option<String>,
    pub cwd: PathBuf,
    /// Executable search path, `PATH` syntax.
    pub path: OsString,
    pub runtime_dir: PathBuf,
    pub hover_fifo: Option<PathBuf>,
    pub control_fifo: Option<PathBuf>,
    pub preview_control_fifo: Option<PathBuf>,
    pub offset_file: Option<PathBuf>,
}

/// Error raised when the session environment is missing or malformed.
#[derive(Debug, thiserror::Error)]
pub enum SessionEnvError {
    #[error("session variable {0} is not set")]
    Missing(String),

    #[error("session variable {key} has an invalid value '{value}'")]
    Invalid { key: String, value: String },
}

impl SessionConfig {
    /// Serialise every key to `(variable, value)` pairs. Unset optional keys
    /// are omitted so the child sees them as absent.
    pub fn to_env(&self) -> Vec<(String, OsString)> {
        let mut env: Vec<(String, OsString)> = Vec::new();
        let mut put = |key: &str, value: OsString| {
            env.push((format!("{}{}", ENV_PREFIX, key), value));
        };

        put("SPLIT_DIR", self.split_dir.as_str().into());
        put("SPLIT_SIZE_PCT", self.split_size_pct.to_string().into());
        put("TERMINAL_KIND", self.terminal_kind.as_str().into());
        put("EMULATOR", self.emulator.as_str().into());
        if let Some(cmd) = &self.pager_cmd {
            put("PAGER_CMD", cmd.into());
        }
        if let Some(theme) = &self.pager_theme {
            put("PAGER_THEME", theme.into());
        }
        if let Some(style) = &self.pager_style {
            put("PAGER_STYLE", style.into());
        }
        put("PREVIEW_WIDTH", self.preview_width.to_string().into());
        put("PREVIEW_HEIGHT", self.preview_height.to_string().into());
        put("CACHE_DIR", self.cache_dir.clone().into_os_string());
        if let Some(prog) = &self.image_prog {
            put("IMAGE_PROG", prog.into());
        }
        if let Some(backend) = &self.video_backend {
            put("VIDEO_BACKEND", backend.into());
        }
        put("CWD", self.cwd.clone().into_os_string());
        put("PATH", self.path.clone());
        put("RUNTIME_DIR", self.runtime_dir.clone().into_os_string());
        if let Some(p) = &self.hover_fifo {
            put("HOVER_FIFO", p.clone().into_os_string());
        }
        if let Some(p) = &self.control_fifo {
            put("CONTROL_FIFO", p.clone().into_os_string());
        }
        if let Some(p) = &self.preview_control_fifo {
            put("PREVIEW_CONTROL_FIFO", p.clone().into_os_string());
        }
        if let Some(p) = &self.offset_file {
            put("OFFSET_FILE", p.clone().into_os_string());
        }
        env
    }

    /// Rebuild a snapshot from the current process environment.
    pub fn from_process_env() -> Result<Self, SessionEnvError> {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Rebuild a snapshot from an arbitrary variable lookup.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Result<Self, SessionEnvError> {
        let get = |key: &str| lookup(&format!("{}{}", ENV_PREFIX, key));
        let text = |key: &str| get(key).map(|v| v.to_string_lossy().into_owned());
        let required = |key: &str| {
            get(key).ok_or_else(|| SessionEnvError::Missing(format!("{}{}", ENV_PREFIX, key)))
        };

        Ok(Self {
            split_dir: parse_key("SPLIT_DIR", text("SPLIT_DIR"))?.unwrap_or_default(),
            split_size_pct: parse_key("SPLIT_SIZE_PCT", text("SPLIT_SIZE_PCT"))?.unwrap_or(50),
            terminal_kind: parse_key("TERMINAL_KIND", text("TERMINAL_KIND"))?.unwrap_or_default(),
            emulator: parse_key("EMULATOR", text("EMULATOR"))?.unwrap_or_default(),
            pager_cmd: text("PAGER_CMD").filter(|s| !s.is_empty()),
            pager_theme: text("PAGER_THEME").filter(|s| !s.is_empty()),
            pager_style: text("PAGER_STYLE").filter(|s| !s.is_empty()),
            preview_width: parse_key("PREVIEW_WIDTH", text("PREVIEW_WIDTH"))?.unwrap_or(1920),
            preview_height: parse_key("PREVIEW_HEIGHT", text("PREVIEW_HEIGHT"))?.unwrap_or(1080),
            cache_dir: PathBuf::from(required("CACHE_DIR")?),
            image_prog: text("IMAGE_PROG").filter(|s| !s.is_empty()),
            video_backend: text("VIDEO_BACKEND").filter(|s| !s.is_empty()),
            cwd: PathBuf::from(required("CWD")?),
            path: get("PATH").unwrap_or_default(),
            runtime_dir: PathBuf::from(required("RUNTIME_DIR")?),
            hover_fifo: get("HOVER_FIFO").map(PathBuf::from),
            control_fifo: get("CONTROL_FIFO").map(PathBuf::from),
            preview_control_fifo: get("PREVIEW_CONTROL_FIFO").map(PathBuf::from),
            offset_file: get("OFFSET_FILE").map(PathBuf::from),
        })
    }
}

fn parse_key<T: FromStr>(key: &str, value: Option<String>) -> Result<Option<T>, SessionEnvError> {
    match value {
        None => Ok(None),
        Some(v) => v.trim().parse::<T>().map(Some).map_err(|_| SessionEnvError::Invalid {
            key: format!("{}{}", ENV_PREFIX, key),
            value: v,
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) fn sample() -> SessionConfig {
        SessionConfig {
            split_dir: SplitDir::Horizontal,
            split_size_pct: 40,
            terminal_kind: TerminalKind::Tmux,
            emulator: Emulator::Kitty,
            pager_cmd: Some("less -R".to_string()),
            pager_theme: Some("ansi".to_string()),
            pager_style: None,
            preview_width: 800,
            preview_height: 600,
            cache_dir: PathBuf::from("/tmp/cache"),
            image_prog: None,
            video_backend: Some("mpv".to_string()),
            cwd: PathBuf::from("/home/me"),
            path: OsString::from("/usr/bin:/bin"),
            runtime_dir: PathBuf::from("/tmp/preview-pane-1000"),
            hover_fifo: Some(PathBuf::from("/tmp/nnn.fifo")),
            control_fifo: None,
            preview_control_fifo: None,
            offset_file: None,
        }
    }

    #[test]
    fn test_env_round_trip_preserves_snapshot() {
        let config = sample();
        let env: HashMap<String, OsString> = config.to_env().into_iter().collect();
        let back = SessionConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_unset_optionals_are_not_exported() {
        let env = sample().to_env();
        assert!(!env.iter().any(|(k, _)| k == "PREVIEW_PANE_PAGER_STYLE"));
        assert!(!env.iter().any(|(k, _)| k == "PREVIEW_PANE_IMAGE_PROG"));
    }

    #[test]
    fn test_missing_cache_dir_is_reported() {
        let err = SessionConfig::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains("PREVIEW_PANE_CACHE_DIR"));
    }

    #[test]
    fn test_invalid_split_size_is_rejected() {
        let mut env: HashMap<String, OsString> = sample().to_env().into_iter().collect();
        env.insert("PREVIEW_PANE_SPLIT_SIZE_PCT".into(), "lots".into());
        let err = SessionConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, SessionEnvError::Invalid { .. }));
    }

    #[test]
    fn test_split_dir_parsing() {
        assert_eq!("h".parse::<SplitDir>().unwrap(), SplitDir::Horizontal);
        assert_eq!("Vertical".parse::<SplitDir>().unwrap(), SplitDir::Vertical);
        assert!("diagonal".parse::<SplitDir>().is_err());
    }

    #[test]
    fn test_emulator_detection() {
        let kitty = Emulator::detect(|k| (k == "KITTY_WINDOW_ID").then(|| "1".to_string()));
        assert_eq!(kitty, Emulator::Kitty);

        let wez = Emulator::detect(|k| (k == "TERM_PROGRAM").then(|| "WezTerm".to_string()));
        assert_eq!(wez, Emulator::Wezterm);

        assert_eq!(Emulator::detect(|_| None), Emulator::Other);
    }
}
