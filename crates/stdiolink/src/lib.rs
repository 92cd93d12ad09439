//! Drive a line-delimited JSON worker process, one operation at a time.
//!
//! A front-end spawns a long-lived worker, writes `{"DO": ...}` commands to
//! its stdin and reads reports, GUI requests and `{"DONE": ...}`
//! completions back from its stdout. stderr is forwarded as diagnostics.
//!
//! # Crate Structure
//!
//! - [`transport`] — Worker process spawning with piped standard streams
//! - [`frame`] — Delimiter-terminated framing (and a `tokio_util` codec behind `async`)
//! - [`session`] — Message decoding, the single-operation controller and the connection

/// Re-export transport types.
pub mod transport {
    pub use stdiolink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use stdiolink_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use stdiolink_session::*;
}

pub use stdiolink_session::{
    BackendConnection, Collaborators, Command, Message, RequestHandle, Session, SessionConfig,
    SessionError, SessionEvent,
};
pub use stdiolink_transport::WorkerSpec;
