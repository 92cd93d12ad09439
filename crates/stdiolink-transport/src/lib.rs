//! Worker process transport.
//!
//! Spawns the back-end worker with all three standard streams piped and
//! hands the pipes out separately, so the writer, the output reader and
//! the error-stream reader can each live on their own thread.
//!
//! This is the lowest layer of stdiolink. Everything else builds on top of
//! the [`WorkerProcess`] type provided here.

pub mod error;
pub mod process;
pub mod spec;

pub use error::{Result, TransportError};
pub use process::{ExitState, WorkerPipes, WorkerProcess};
pub use spec::WorkerSpec;
