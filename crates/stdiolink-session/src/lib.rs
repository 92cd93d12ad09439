//! Single-operation protocol session over a worker's standard streams.
//!
//! This is the layer that knows what the lines mean. Commands go out as
//! `{"DO": ...}` objects; the worker answers with reports and finally a
//! `{"DONE": ...}` completion. At most one command is in flight at a time.

pub mod collab;
pub mod command;
pub mod config;
pub mod connector;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod message;
pub mod monitor;
pub mod protocol;
pub mod session;

pub use collab::{
    AlertKind, Collaborators, Diagnostics, GuiExecutor, NoopGui, Operator, ProgressSink,
    TracingDiagnostics, TracingOperator, TracingProgress,
};
pub use command::Command;
pub use config::SessionConfig;
pub use connector::{BackendConnection, Request, RequestHandle, TERMINATE_GRACE, TICK_INTERVAL};
pub use controller::OperationController;
pub use dispatch::{Dispatch, ReportDispatcher};
pub use error::{Result, SessionError};
pub use event::{CompletedOperation, ProtocolViolation, SessionEvent};
pub use message::{decode, Completion, GuiCommand, Malformed, Message, Report, Unrecognized};
pub use monitor::ErrorStreamMonitor;
pub use protocol::{
    ReportKind, KEY_DATA, KEY_DO, KEY_DONE, KEY_FORCE, KEY_GUI, KEY_OBJECT, KEY_REPORT, KEY_TEXT,
    VERB_CANCEL, VERB_QUIT,
};
pub use session::Session;
