//! Configuration file handling for preview-pane.
//!
//! Loads configuration from `~/.config/preview-pane/config.toml` or a custom path.
//! [`Settings::resolve`] layers the file under environment variables and CLI
//! flags to produce the values a session is started with.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::PreviewCache;
use crate::session::{SplitDir, TerminalKind};

/// Configuration file structure for preview-pane.
/// Loaded from ~/.config/preview-pane/config.toml (or custom path via --config).
#[derive(Debug, Deserialize, Serialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub pager: PagerConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct SplitConfig {
    /// `h`/`horizontal` or `v`/`vertical`; unset means pick by pane shape.
    pub direction: Option<String>,
    #[serde(default = "default_split_size")]
    pub size: u8,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            direction: None,
            size: default_split_size(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, PartialEq)]
pub struct TerminalConfig {
    /// Force a host: tmux, kitty, wezterm, zellij, screen or external.
    pub kind: Option<String>,
    /// Terminal started by the external fallback, e.g. `alacritty`.
    pub external: Option<String>,
    /// Viewer opened directly on the path by the external fallback.
    pub viewer: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Default, PartialEq)]
pub struct PagerConfig {
    pub command: Option<String>,
    pub theme: Option<String>,
    pub style: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct ImageConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    pub program: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            program: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, PartialEq)]
pub struct VideoConfig {
    /// `mpv`, or any player invoked as `<player> <path>`.
    pub backend: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Default, PartialEq)]
pub struct CacheConfig {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Default, PartialEq)]
pub struct ChannelsConfig {
    pub hover: Option<PathBuf>,
    pub control: Option<PathBuf>,
    pub preview_control: Option<PathBuf>,
    pub offset_file: Option<PathBuf>,
}

fn default_split_size() -> u8 {
    50
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Render as TOML, for `config show` and `config init`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }
}

/// Values given on the command line. They win over everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub split: Option<SplitDir>,
    pub split_size: Option<u8>,
    pub terminal_kind: Option<TerminalKind>,
    pub hover: Option<PathBuf>,
    pub control: Option<PathBuf>,
}

/// Effective settings after layering defaults, file, environment and CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Explicit orientation; `None` lets the supervisor decide.
    pub split_dir: Option<SplitDir>,
    pub split_size_pct: u8,
    /// Explicit host; consulted only after live detection finds nothing.
    pub terminal_kind: Option<TerminalKind>,
    pub external_terminal: Option<String>,
    pub external_viewer: Option<String>,
    pub pager_cmd: Option<String>,
    pub pager_theme: Option<String>,
    pub pager_style: Option<String>,
    pub preview_width: u32,
    pub preview_height: u32,
    pub image_prog: Option<String>,
    pub video_backend: Option<String>,
    pub cache_dir: PathBuf,
    pub runtime_dir: PathBuf,
    pub hover_fifo: Option<PathBuf>,
    pub control_fifo: Option<PathBuf>,
    pub preview_control_fifo: Option<PathBuf>,
    pub offset_file: Option<PathBuf>,
}

impl Settings {
    /// Layer `config` under the environment (`var`) and `overrides`.
    ///
    /// Environment variables: `NNN_FIFO` (hover), `NNN_PPIPE` (control),
    /// `TERMINAL` (external terminal), `PAGER`.
    pub fn resolve(
        config: &Config,
        overrides: &Overrides,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env_path = |key: &str| var(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        let env_text = |key: &str| var(key).filter(|v| !v.is_empty());

        let split_dir = match overrides.split {
            Some(dir) => Some(dir),
            None => config
                .split
                .direction
                .as_deref()
                .map(|d| parse_value("split.direction", d))
                .transpose()?,
        };
        let terminal_kind = match overrides.terminal_kind {
            Some(kind) => Some(kind),
            None => config
                .terminal
                .kind
                .as_deref()
                .map(|k| parse_value("terminal.kind", k))
                .transpose()?,
        };
        let split_size_pct = overrides.split_size.unwrap_or(config.split.size);
        if !(1..=99).contains(&split_size_pct) {
            return Err(ConfigError::InvalidValue {
                key: "split.size".to_string(),
                value: split_size_pct.to_string(),
            });
        }

        Ok(Self {
            split_dir,
            split_size_pct,
            terminal_kind,
            external_terminal: env_text("TERMINAL").or_else(|| config.terminal.external.clone()),
            external_viewer: config.terminal.viewer.clone(),
            pager_cmd: env_text("PAGER").or_else(|| config.pager.command.clone()),
            pager_theme: config.pager.theme.clone(),
            pager_style: config.pager.style.clone(),
            preview_width: config.image.width,
            preview_height: config.image.height,
            image_prog: config.image.program.clone(),
            video_backend: config.video.backend.clone(),
            cache_dir: config.cache.dir.clone().unwrap_or_else(PreviewCache::default_root),
            runtime_dir: default_runtime_dir(),
            hover_fifo: overrides
                .hover
                .clone()
                .or_else(|| env_path("NNN_FIFO"))
                .or_else(|| config.channels.hover.clone()),
            control_fifo: overrides
                .control
                .clone()
                .or_else(|| env_path("NNN_PPIPE"))
                .or_else(|| config.channels.control.clone()),
            preview_control_fifo: config.channels.preview_control.clone(),
            offset_file: config.channels.offset_file.clone(),
        })
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Per-user runtime directory: `$TMPDIR/preview-pane-<uid>`.
pub fn default_runtime_dir() -> PathBuf {
    // SAFETY: getuid has no preconditions and cannot fail.
    let uid = unsafe { libc::getuid() };
    std::env::temp_dir().join(format!("preview-pane-{}", uid))
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    SerializeError(toml::ser::Error),
    InvalidValue {
        key: String,
        value: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::SerializeError(source) => write!(f, "Failed to render config: {}", source),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value '{}' for {}", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::SerializeError(source) => Some(source),
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("preview-pane").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/preview-pane/config.toml")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.split.size, 50);
        assert_eq!(config.image.width, 1920);
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[split]\ndirection = \"h\"\n\n[video]\nbackend = \"mpv\"\n\n[channels]\nhover = \"/tmp/nnn.fifo\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.split.direction.as_deref(), Some("h"));
        assert_eq!(config.split.size, 50);
        assert_eq!(config.video.backend.as_deref(), Some("mpv"));
        assert_eq!(config.channels.hover, Some(PathBuf::from("/tmp/nnn.fifo")));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[split\n").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.pager.command = Some("less -R".into());
        config.terminal.kind = Some("tmux".into());
        let text = config.to_toml().unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_cli_beats_env_beats_file() {
        let mut config = Config::default();
        config.channels.hover = Some(PathBuf::from("/file/hover"));
        config.pager.command = Some("file-pager".into());
        let env: HashMap<&str, &str> = [("NNN_FIFO", "/env/hover"), ("PAGER", "less")].into();
        let var = |k: &str| env.get(k).map(|v| v.to_string());

        let settings = Settings::resolve(&config, &Overrides::default(), var).unwrap();
        assert_eq!(settings.hover_fifo, Some(PathBuf::from("/env/hover")));
        assert_eq!(settings.pager_cmd.as_deref(), Some("less"));

        let overrides = Overrides {
            hover: Some(PathBuf::from("/cli/hover")),
            ..Overrides::default()
        };
        let settings = Settings::resolve(&config, &overrides, var).unwrap();
        assert_eq!(settings.hover_fifo, Some(PathBuf::from("/cli/hover")));
    }

    #[test]
    fn test_explicit_split_and_kind() {
        let mut config = Config::default();
        config.split.direction = Some("vertical".into());
        config.terminal.kind = Some("zellij".into());

        let settings = Settings::resolve(&config, &Overrides::default(), no_env).unwrap();
        assert_eq!(settings.split_dir, Some(SplitDir::Vertical));
        assert_eq!(settings.terminal_kind, Some(TerminalKind::Zellij));

        let overrides = Overrides {
            split: Some(SplitDir::Horizontal),
            ..Overrides::default()
        };
        let settings = Settings::resolve(&config, &overrides, no_env).unwrap();
        assert_eq!(settings.split_dir, Some(SplitDir::Horizontal));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.terminal.kind = Some("konsole".into());
        let err = Settings::resolve(&config, &Overrides::default(), no_env).unwrap_err();
        assert!(err.to_string().contains("terminal.kind"));

        let mut config = Config::default();
        config.split.size = 0;
        assert!(Settings::resolve(&config, &Overrides::default(), no_env).is_err());
    }

    #[test]
    fn test_default_paths() {
        assert!(default_path().ends_with("preview-pane/config.toml"));
        assert!(default_runtime_dir()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("preview-pane-"));
    }
}
