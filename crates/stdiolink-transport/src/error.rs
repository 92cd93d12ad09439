use std::path::PathBuf;

/// Errors that can occur while launching or supervising the worker.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The worker executable could not be started.
    #[error("failed to spawn {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// A standard stream was not piped (or was already taken).
    #[error("worker {0} is not available")]
    MissingPipe(&'static str),

    /// An I/O error occurred while supervising the worker.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
