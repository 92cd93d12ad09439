//! Capabilities the session drives but does not implement.
//!
//! A front-end supplies these to present progress, ask the operator
//! questions and act on GUI commands. The `Tracing*` defaults route every
//! call into `tracing`, so a session with nothing wired is still observable.

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::event::ProtocolViolation;
use crate::message::GuiCommand;

/// Displays the status of the running operation.
pub trait ProgressSink {
    /// An operation started; `label` is its verb.
    fn start(&mut self, label: &str);
    /// Replace the progress text.
    fn set_progress(&mut self, text: &str);
    /// Append a line to the operation log.
    fn append_log(&mut self, text: &str);
    /// Make the progress display visible now, whatever its delay policy.
    fn force_visible(&mut self);
    /// The operation ended.
    fn done(&mut self);
    /// Called periodically while an operation is outstanding, whether or
    /// not the worker said anything. Time-based display policies act here.
    fn tick(&mut self) {}
}

/// Why the operator is being alerted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// The worker reported an internal defect.
    Bug,
    /// The worker refused a command because it was busy.
    BackendBusy,
    /// A report kind outside the known vocabulary.
    UnknownReport,
}

impl AlertKind {
    /// Alert title.
    pub fn title(self) -> &'static str {
        match self {
            AlertKind::Bug => "BUG",
            AlertKind::BackendBusy => "BACKEND_BUSY",
            AlertKind::UnknownReport => "BACKEND_ERROR",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Blocking interaction with the human operator.
pub trait Operator {
    /// Show an alert the operator must acknowledge.
    fn alert(&mut self, kind: AlertKind, text: &str);
    /// Ask a yes/no question.
    fn confirm(&mut self, question: &str) -> bool;
}

/// Receives everything that is wrong or merely informational.
pub trait Diagnostics {
    /// Input the session could not act on.
    fn invalid_input(&mut self, violation: &ProtocolViolation);
    /// Raw text from the worker's error stream.
    fn worker_stderr(&mut self, text: &str);
}

/// Performs `GUI` commands sent by the worker.
pub trait GuiExecutor {
    fn execute(&mut self, command: &GuiCommand);
}

/// The full set of collaborators a session talks to.
pub struct Collaborators {
    pub progress: Box<dyn ProgressSink + Send>,
    pub operator: Box<dyn Operator + Send>,
    pub diagnostics: Box<dyn Diagnostics + Send>,
    pub gui: Box<dyn GuiExecutor + Send>,
}

impl Collaborators {
    /// Replace the progress sink.
    pub fn with_progress(mut self, progress: impl ProgressSink + Send + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Replace the operator.
    pub fn with_operator(mut self, operator: impl Operator + Send + 'static) -> Self {
        self.operator = Box::new(operator);
        self
    }

    /// Replace the diagnostics sink.
    pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + Send + 'static) -> Self {
        self.diagnostics = Box::new(diagnostics);
        self
    }

    /// Replace the GUI executor.
    pub fn with_gui(mut self, gui: impl GuiExecutor + Send + 'static) -> Self {
        self.gui = Box::new(gui);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            progress: Box::new(TracingProgress),
            operator: Box::new(TracingOperator::default()),
            diagnostics: Box::new(TracingDiagnostics),
            gui: Box::new(NoopGui),
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Progress sink that logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn start(&mut self, label: &str) {
        info!(verb = label, "operation started");
    }

    fn set_progress(&mut self, text: &str) {
        debug!(text, "progress");
    }

    fn append_log(&mut self, text: &str) {
        info!("{text}");
    }

    fn force_visible(&mut self) {}

    fn done(&mut self) {
        info!("operation finished");
    }
}

/// Operator that logs alerts and answers every question the same way.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOperator {
    /// Answer returned from [`Operator::confirm`].
    pub assume_yes: bool,
}

impl Operator for TracingOperator {
    fn alert(&mut self, kind: AlertKind, text: &str) {
        error!(%kind, "{text}");
    }

    fn confirm(&mut self, question: &str) -> bool {
        warn!(answer = self.assume_yes, "{question}");
        self.assume_yes
    }
}

/// Diagnostics sink that logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn invalid_input(&mut self, violation: &ProtocolViolation) {
        warn!("{violation}");
    }

    fn worker_stderr(&mut self, text: &str) {
        warn!(stream = "stderr", "{}", text.trim_end());
    }
}

/// GUI executor that ignores every command.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGui;

impl GuiExecutor for NoopGui {
    fn execute(&mut self, command: &GuiCommand) {
        debug!(command = %command.command, object = ?command.object, "gui command ignored");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// One observed collaborator call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        Start(String),
        SetProgress(String),
        AppendLog(String),
        ForceVisible,
        Done,
        Tick,
        Alert(AlertKind, String),
        Confirm(String),
        Invalid(String),
        Stderr(String),
        Gui(String),
    }

    /// Shared log of calls across all four collaborators.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
        confirm_answer: bool,
    }

    impl Recorder {
        pub(crate) fn answering(confirm_answer: bool) -> Self {
            Self {
                calls: Arc::default(),
                confirm_answer,
            }
        }

        pub(crate) fn collaborators(&self) -> Collaborators {
            Collaborators::default()
                .with_progress(self.clone())
                .with_operator(self.clone())
                .with_diagnostics(self.clone())
                .with_gui(self.clone())
        }

        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ProgressSink for Recorder {
        fn start(&mut self, label: &str) {
            self.push(Call::Start(label.to_string()));
        }

        fn set_progress(&mut self, text: &str) {
            self.push(Call::SetProgress(text.to_string()));
        }

        fn append_log(&mut self, text: &str) {
            self.push(Call::AppendLog(text.to_string()));
        }

        fn force_visible(&mut self) {
            self.push(Call::ForceVisible);
        }

        fn done(&mut self) {
            self.push(Call::Done);
        }

        fn tick(&mut self) {
            self.push(Call::Tick);
        }
    }

    impl Operator for Recorder {
        fn alert(&mut self, kind: AlertKind, text: &str) {
            self.push(Call::Alert(kind, text.to_string()));
        }

        fn confirm(&mut self, question: &str) -> bool {
            self.push(Call::Confirm(question.to_string()));
            self.confirm_answer
        }
    }

    impl Diagnostics for Recorder {
        fn invalid_input(&mut self, violation: &ProtocolViolation) {
            self.push(Call::Invalid(violation.to_string()));
        }

        fn worker_stderr(&mut self, text: &str) {
            self.push(Call::Stderr(text.to_string()));
        }
    }

    impl GuiExecutor for Recorder {
        fn execute(&mut self, command: &GuiCommand) {
            self.push(Call::Gui(command.command.clone()));
        }
    }
}
