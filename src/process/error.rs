//! Process lifecycle error types

/// Error type for spawning, signalling and reaping preview processes
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The program could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// kill(2) failed for a reason other than the process being gone
    #[error("failed to signal pid {pid}: {source}")]
    Signal { pid: u32, source: std::io::Error },

    /// waitpid failed
    #[error("failed to wait for pid {pid}: {source}")]
    Wait { pid: u32, source: std::io::Error },
}

impl ProcessError {
    /// Map a spawn failure, keeping the program name for the message.
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        ProcessError::Spawn {
            program: program.into(),
            source,
        }
    }
}
