//! Subcommand handlers.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use super::args::{CacheAction, ConfigAction, ToggleArgs};
use crate::cache::PreviewCache;
use crate::channel::HoverChannel;
use crate::classify::ContentClass;
use crate::config::{default_path as get_config_path, Config, Overrides, Settings};
use crate::engine::{Engine, ProcessLauncher};
use crate::handlers::{self, binary::format_size, PreviewContext};
use crate::logging;
use crate::session::SessionConfig;
use crate::signals;
use crate::supervisor::{report_misconfiguration, Supervisor, SupervisorError, SystemProbe, ToggleOutcome};
use crate::terminal::{self, Foreground};

/// Failure of a command, as `main` reports it.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// A misconfiguration the user has already been shown.
    #[error("{0}")]
    Reported(SupervisorError),

    #[error("cannot report error: {0}")]
    Report(#[from] io::Error),
}

impl From<String> for CliError {
    fn from(message: String) -> Self {
        CliError::Message(message)
    }
}

impl CliError {
    /// Whether the message still needs printing.
    pub fn needs_report(&self) -> bool {
        !matches!(self, CliError::Reported(_))
    }
}

fn load_settings(config_path: Option<&Path>, overrides: &Overrides) -> Result<Settings, String> {
    let config = Config::load(config_path).map_err(|e| e.to_string())?;
    Settings::resolve(&config, overrides, |key| std::env::var(key).ok()).map_err(|e| e.to_string())
}

/// Open the preview pane, or close the running one.
pub fn run_toggle(config_path: Option<&Path>, toggle: &ToggleArgs) -> Result<(), CliError> {
    logging::init_to_stderr();
    let settings = load_settings(config_path, &toggle.overrides())?;
    let entry = std::env::current_exe().map_err(|e| format!("Cannot locate executable: {}", e))?;
    let supervisor = Supervisor::new(settings, SystemProbe, entry);

    match supervisor.toggle(toggle.path.clone()) {
        Ok(ToggleOutcome::Stopped { pid }) => {
            log::info!("Preview session {} stopped", pid);
            Ok(())
        }
        Ok(ToggleOutcome::Started { kind, outcome }) => {
            log::info!("Preview opened in {}: {:?}", kind, outcome);
            Ok(())
        }
        Err(e) if e.is_misconfiguration() => {
            let stdin = io::stdin();
            let interactive = stdin.is_terminal();
            report_misconfiguration(&e, &mut stdin.lock(), &mut io::stderr(), interactive)?;
            Err(CliError::Reported(e))
        }
        Err(e) => Err(e.into()),
    }
}

/// Run the engine in this pane until the session closes.
pub fn run_render(path: Option<PathBuf>) -> Result<(), String> {
    let config = SessionConfig::from_process_env()
        .map_err(|e| format!("Invalid session environment: {}", e))?;
    logging::init_to_file(&config.runtime_dir);

    signals::install_resize_handler().map_err(|e| format!("Failed to install SIGWINCH handler: {}", e))?;
    signals::install_termination_handler(config.hover_fifo.clone())
        .map_err(|e| format!("Failed to install signal handler: {}", e))?;

    let terminal = Foreground::detect();
    if terminal.is_none() {
        log::info!("Not in the terminal's foreground group; jobs will not own the terminal");
    }
    let launcher = ProcessLauncher::current(&config)
        .map_err(|e| format!("Cannot locate executable: {}", e))?
        .with_terminal(terminal);
    let hover_path = config.hover_fifo.clone();
    let cwd = config.cwd.clone();

    let mut engine = Engine::new(config, launcher).with_terminal(terminal);
    engine.start(path);

    let Some(hover_path) = hover_path else {
        engine.teardown();
        return Err("No hover channel in session environment".to_string());
    };
    if signals::termination_requested() {
        engine.teardown();
        return Ok(());
    }

    log::info!("Waiting for selections on {}", hover_path.display());
    let mut hover = HoverChannel::open(&hover_path, &cwd)
        .map_err(|e| format!("Failed to open hover channel {}: {}", hover_path.display(), e))?;
    engine
        .run(&mut hover)
        .map_err(|e| format!("Hover channel failed: {}", e))
}

/// Draw one selection into this pane.
pub fn run_job(class: ContentClass, path: &Path) -> Result<(), String> {
    let config = SessionConfig::from_process_env()
        .map_err(|e| format!("Invalid session environment: {}", e))?;
    logging::init_to_file(&config.runtime_dir);
    log::debug!("Rendering {} as {}", path.display(), class);
    if let Err(e) = signals::install_resize_relay() {
        log::warn!("Failed to relay SIGWINCH: {}", e);
    }

    let ctx = PreviewContext::new(config);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = terminal::clear_screen(&mut out)
        .map_err(|e| e.to_string())
        .and_then(|()| handlers::render(&ctx, &mut out, path, class).map_err(|e| e.to_string()))
        .and_then(|()| out.flush().map_err(|e| e.to_string()));

    // A finished job leaves the terminal to the engine again.
    if let Some(terminal) = Foreground::detect() {
        if let Err(e) = terminal.return_to_parent() {
            log::debug!("Cannot return the terminal: {}", e);
        }
    }
    result
}

/// Handle cache subcommand actions.
pub fn handle_cache_action(config_path: Option<&Path>, action: CacheAction) -> Result<(), String> {
    let settings = load_settings(config_path, &Overrides::default())?;
    let cache = PreviewCache::new(settings.cache_dir);
    let total = cache
        .total_size_bytes()
        .map_err(|e| format!("Failed to read cache directory: {}", e))?;

    match action {
        CacheAction::Size => {
            println!("Cache directory: {}", cache.root().display());
            println!("Total size: {}", format_size(total));
        }
        CacheAction::Clear => {
            let removed = cache
                .clear_all()
                .map_err(|e| format!("Failed to clear cache: {}", e))?;
            println!("Removed {} cached previews ({} freed)", removed, format_size(total));
        }
    }
    Ok(())
}

/// Handle config subcommand actions.
pub fn handle_config_action(config_path: Option<&Path>, action: ConfigAction) -> Result<(), String> {
    let path = config_path.map(PathBuf::from).unwrap_or_else(get_config_path);

    match action {
        ConfigAction::Show => {
            let config = Config::load(Some(&path)).map_err(|e| e.to_string())?;
            let settings = load_settings(Some(&path), &Overrides::default())?;
            let show = |p: &Option<PathBuf>| {
                p.as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            };

            println!("Current configuration:");
            println!("  Hover channel: {}", show(&settings.hover_fifo));
            println!("  Control channel: {}", show(&settings.control_fifo));
            println!("  Cache directory: {}", settings.cache_dir.display());
            println!("  Runtime directory: {}", settings.runtime_dir.display());
            println!();
            print!("{}", config.to_toml().map_err(|e| e.to_string())?);
            println!();

            if path.exists() {
                println!("Config file: {} (exists)", path.display());
            } else {
                println!("Config file: {} (not found)", path.display());
            }
            Ok(())
        }
        ConfigAction::Init => {
            if path.exists() {
                return Err(format!(
                    "Config file already exists: {}\nUse 'preview-pane config show' to view current settings.",
                    path.display()
                ));
            }
            write_default_config(&path)?;
            println!("Created config file: {}", path.display());
            Ok(())
        }
    }
}

fn write_default_config(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("Error creating config directory: {}", e))?;
    }
    let body = Config::default().to_toml().map_err(|e| e.to_string())?;
    let contents = format!(
        "# preview-pane configuration\n\
         #\n\
         # split.direction: \"horizontal\" or \"vertical\" (unset: chosen from terminal shape)\n\
         # terminal.kind: tmux, kitty, wezterm, zellij, screen or external\n\
         # channels.hover defaults to $NNN_FIFO\n\n{}",
        body
    );
    std::fs::write(path, contents).map_err(|e| format!("Error writing config file: {}", e))
}
