//! Process-wide signal wiring for the renderer engine.
//!
//! Termination signals (SIGINT, SIGTERM, SIGHUP) go through `ctrlc`; the
//! handler thread sets a flag and writes `close` into the hover conduit so
//! the blocked engine wakes up and tears down on its own thread.
//!
//! SIGWINCH is installed without `SA_RESTART`, so the engine's blocking read
//! fails with `EINTR` and the engine checks [`take_resize`]. While a render
//! job owns the terminal the kernel signals the job's group instead, and the
//! job relays the signal to the engine with [`install_resize_relay`].

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::channel::{open_writer, WriterOpen, CLOSE_TOKEN};

/// Set once a termination signal arrives.
static TERMINATION_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Set by the SIGWINCH handler, cleared by [`take_resize`].
static RESIZE_PENDING: AtomicBool = AtomicBool::new(false);

/// Whether a termination signal has been received.
pub fn termination_requested() -> bool {
    TERMINATION_REQUESTED.load(Ordering::SeqCst)
}

/// Consume a pending resize notification.
pub fn take_resize() -> bool {
    RESIZE_PENDING.swap(false, Ordering::SeqCst)
}

extern "C" fn on_winch(_: libc::c_int) {
    RESIZE_PENDING.store(true, Ordering::SeqCst);
}

/// Install the SIGWINCH handler for the calling process.
pub fn install_resize_handler() -> io::Result<()> {
    // SAFETY: the handler only touches an atomic, which is async-signal-safe.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_winch as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGWINCH, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

extern "C" fn relay_winch(_: libc::c_int) {
    // SAFETY: getppid and kill are async-signal-safe.
    unsafe {
        libc::kill(libc::getppid(), libc::SIGWINCH);
    }
}

/// Pass SIGWINCH on to the parent process. Installed by render jobs, whose
/// parent is the engine.
pub fn install_resize_relay() -> io::Result<()> {
    // SAFETY: the handler only calls async-signal-safe functions.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = relay_winch as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGWINCH, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Install the termination handler. `hover` is the conduit the engine is
/// blocked on, if any.
///
/// SIGWINCH is blocked while the handler thread is created so that thread
/// inherits the mask and the signal is always delivered to the engine.
pub fn install_termination_handler(hover: Option<PathBuf>) -> Result<(), ctrlc::Error> {
    let restore = block_winch();
    let result = ctrlc::set_handler(move || {
        TERMINATION_REQUESTED.store(true, Ordering::SeqCst);
        log::info!("Termination signal received, closing session");
        if let Some(path) = &hover {
            if let WriterOpen::Ready(mut file) = open_writer(path) {
                let _ = writeln!(file, "{}", CLOSE_TOKEN);
            }
        }
    });
    if let Some(previous) = restore {
        // SAFETY: restoring a mask obtained from pthread_sigmask.
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &previous, std::ptr::null_mut());
        }
    }
    result
}

fn block_winch() -> Option<libc::sigset_t> {
    // SAFETY: sigset_t values are initialised by sigemptyset before use.
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        let mut previous: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGWINCH);
        (libc::pthread_sigmask(libc::SIG_BLOCK, &set, &mut previous) == 0).then_some(previous)
    }
}
