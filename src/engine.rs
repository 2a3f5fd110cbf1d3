//! Renderer engine: the `Idle -> Rendering -> Idle` loop of a preview
//! session.
//!
//! The engine runs on a single thread blocked on the hover channel. Every
//! selection cancels the running job, clears the overlay placement and
//! starts a new job process. Jobs are separate process groups, so cancelling
//! one also stops every converter and viewer it started. A job takes the
//! pane's terminal for its group before it execs; the engine takes it back
//! after every cancel.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::channel::{read_preview_control, ControlChannel, HoverChannel, HoverEvent};
use crate::classify::{classify, ContentClass, FileFacts};
use crate::display::OverlayLayer;
use crate::process::{ProcessError, ProcessHandle, ProcessRegistry, Role, Termination};
use crate::session::SessionConfig;
use crate::signals;
use crate::terminal::{clear_screen, Foreground};
use crate::tools::Toolbox;

/// Lifecycle state of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Cancelled,
    Completed,
}

/// The job rendering one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub path: PathBuf,
    pub class: ContentClass,
    pub pid: u32,
    pub status: JobStatus,
}

/// Counts of finished jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobLedger {
    pub completed: usize,
    pub cancelled: usize,
}

impl JobLedger {
    fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Completed => self.completed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
            JobStatus::Running => {}
        }
    }

    /// Number of jobs that have finished either way.
    pub fn finished(&self) -> usize {
        self.completed + self.cancelled
    }
}

/// Starts the process that renders one selection.
pub trait JobLauncher {
    /// Spawn a job for `path`. The returned handle must lead its own
    /// process group.
    fn launch(&mut self, path: &Path, class: ContentClass) -> Result<ProcessHandle, ProcessError>;
}

/// Re-executes this binary as `job --class <class> -- <path>` with the
/// session snapshot in its environment.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    exe: PathBuf,
    env: Vec<(String, OsString)>,
    terminal: Option<Foreground>,
}

impl ProcessLauncher {
    pub fn new(exe: PathBuf, config: &SessionConfig) -> Self {
        Self {
            exe,
            env: config.to_env(),
            terminal: None,
        }
    }

    /// Hand `terminal` to each job's group before the job runs.
    pub fn with_terminal(mut self, terminal: Option<Foreground>) -> Self {
        self.terminal = terminal;
        self
    }

    /// Launch jobs through the currently running executable.
    pub fn current(config: &SessionConfig) -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, config))
    }
}

impl JobLauncher for ProcessLauncher {
    fn launch(&mut self, path: &Path, class: ContentClass) -> Result<ProcessHandle, ProcessError> {
        let mut cmd = Command::new(&self.exe);
        cmd.arg("job")
            .arg("--class")
            .arg(class.as_str())
            .arg("--")
            .arg(path)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .process_group(0);
        if let Some(terminal) = self.terminal {
            // Claimed in the child, so nothing the job runs can touch the
            // terminal from the background.
            // SAFETY: the hook only calls async-signal-safe functions.
            unsafe {
                cmd.pre_exec(move || {
                    let _ = terminal.claim();
                    Ok(())
                });
            }
        }
        let child = cmd
            .spawn()
            .map_err(|e| ProcessError::spawn(self.exe.display().to_string(), e))?;
        Ok(ProcessHandle::from_child(Role::RenderJob, child, true))
    }
}

/// What the caller should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Drives one preview session.
pub struct Engine<L: JobLauncher> {
    config: SessionConfig,
    tools: Toolbox,
    launcher: L,
    registry: ProcessRegistry,
    control: ControlChannel,
    overlay: Option<OverlayLayer>,
    current: Option<RenderJob>,
    last_selection: Option<PathBuf>,
    ledger: JobLedger,
    out: Box<dyn Write>,
    terminal: Option<Foreground>,
    torn_down: bool,
}

impl<L: JobLauncher> Engine<L> {
    pub fn new(config: SessionConfig, launcher: L) -> Self {
        Self {
            tools: Toolbox::new(config.path.clone()),
            registry: ProcessRegistry::new(config.runtime_dir.clone()),
            control: ControlChannel::new(config.control_fifo.clone()),
            config,
            launcher,
            overlay: None,
            current: None,
            last_selection: None,
            ledger: JobLedger::default(),
            out: Box::new(io::stdout()),
            terminal: None,
            torn_down: false,
        }
    }

    /// Take `terminal` back from each job once it is cancelled.
    pub fn with_terminal(mut self, terminal: Option<Foreground>) -> Self {
        self.terminal = terminal;
        self
    }

    /// Send screen control output somewhere other than stdout.
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    /// Record the session, start the overlay listener when the terminal has
    /// no inline graphics, and render `initial` unless the browser has
    /// suspended hover notification.
    pub fn start(&mut self, initial: Option<PathBuf>) {
        self.registry.record_self(Role::Session);
        if !self.config.emulator.has_inline_graphics() {
            self.start_overlay();
        }

        match read_preview_control(self.config.preview_control_fifo.as_deref()) {
            Some(false) => log::info!("Hover notification suspended, skipping initial render"),
            _ => {
                if let Some(path) = initial {
                    self.select(path);
                }
            }
        }
    }

    /// Block on the hover channel until the session ends.
    pub fn run<R: Read>(&mut self, hover: &mut HoverChannel<R>) -> io::Result<()> {
        loop {
            if signals::termination_requested() {
                self.handle_event(HoverEvent::Close);
                return Ok(());
            }
            let event = match hover.next_event() {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("Hover channel failed: {}", e);
                    self.teardown();
                    return Err(e);
                }
            };
            if self.handle_event(event) == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Apply one hover event.
    pub fn handle_event(&mut self, event: HoverEvent) -> Flow {
        match event {
            HoverEvent::Select(path) => {
                self.cancel_current();
                self.clear_overlay();
                self.select(path);
                Flow::Continue
            }
            HoverEvent::Close => {
                self.cancel_current();
                self.clear_overlay();
                self.teardown();
                Flow::Exit
            }
            HoverEvent::Interrupted => {
                if signals::take_resize() {
                    self.resize();
                }
                Flow::Continue
            }
        }
    }

    /// Re-render the last selection at the current pane size.
    ///
    /// Calling it again while a re-render is running simply restarts it.
    pub fn resize(&mut self) {
        log::debug!("Pane resized");
        self.cancel_current();
        if let Err(e) = clear_screen(&mut self.out) {
            log::debug!("Clear screen failed: {}", e);
        }
        if self.overlay.is_some() {
            self.overlay = None;
            self.registry.terminate(Role::OverlayListener);
            self.start_overlay();
        }
        if let Some(path) = self.last_selection.clone() {
            self.select(path);
        }
    }

    /// Stop all work and release every session resource. Safe to call any
    /// number of times.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.cancel_current();
        self.reclaim_terminal();
        self.overlay = None;
        self.registry.teardown();
        self.control.signal(false);
        log::info!(
            "Session closed: {} completed, {} cancelled",
            self.ledger.completed,
            self.ledger.cancelled
        );
    }

    pub fn current(&self) -> Option<&RenderJob> {
        self.current.as_ref()
    }

    pub fn last_selection(&self) -> Option<&Path> {
        self.last_selection.as_deref()
    }

    pub fn ledger(&self) -> JobLedger {
        self.ledger
    }

    pub fn registry(&mut self) -> &mut ProcessRegistry {
        &mut self.registry
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn select(&mut self, path: PathBuf) {
        let class = classify(&FileFacts::probe(&path, &self.tools));
        log::info!("Selected {} ({})", path.display(), class);
        match self.launcher.launch(&path, class) {
            Ok(handle) => {
                let pid = handle.pid();
                self.registry.register(handle);
                self.current = Some(RenderJob {
                    path: path.clone(),
                    class,
                    pid,
                    status: JobStatus::Running,
                });
            }
            Err(e) => log::warn!("Failed to start job for {}: {}", path.display(), e),
        }
        self.last_selection = Some(path);
    }

    fn cancel_current(&mut self) {
        let Some(mut job) = self.current.take() else {
            return;
        };
        job.status = match self.registry.terminate(Role::RenderJob) {
            Some(Termination::Terminated) => JobStatus::Cancelled,
            Some(Termination::AlreadyExited) | None => JobStatus::Completed,
        };
        log::debug!("Job for {} ended as {:?}", job.path.display(), job.status);
        self.ledger.record(job.status);
        self.reclaim_terminal();
    }

    fn reclaim_terminal(&self) {
        if let Some(terminal) = &self.terminal {
            if let Err(e) = terminal.claim() {
                log::debug!("Cannot take back the terminal: {}", e);
            }
        }
    }

    fn clear_overlay(&self) {
        if let Some(overlay) = &self.overlay {
            overlay.remove_entry();
        }
    }

    fn start_overlay(&mut self) {
        if let Some((layer, handle)) = OverlayLayer::start(&self.config.runtime_dir, &self.tools) {
            self.registry.register(handle);
            self.overlay = Some(layer);
        }
    }
}

impl<L: JobLauncher> Drop for Engine<L> {
    fn drop(&mut self) {
        self.teardown();
    }
}
