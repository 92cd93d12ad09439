/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A command was sent while another one is still outstanding.
    #[error("backend operation still running: cannot start '{verb}' while '{pending}' is in progress")]
    Busy { verb: String, pending: String },

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] stdiolink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] stdiolink_frame::FrameError),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value could not be turned into a command.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The worker is gone.
    #[error("worker disconnected: {0}")]
    Disconnected(String),

    /// Waiting for the worker timed out.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// An I/O error outside the framed streams.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// True for the rejection of a command sent while busy.
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionError::Busy { .. })
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
