//! Terminal collaborators for the CLI.
//!
//! Progress and alerts go to stderr so stdout stays machine-readable.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use clap::ValueEnum;
use stdiolink_session::{
    AlertKind, Collaborators, Diagnostics, Operator, ProgressSink, ProtocolViolation,
};

/// How `QUIT_UNSAVED?` is answered.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ConfirmPolicy {
    Yes,
    #[default]
    No,
}

/// Build the console collaborator set.
pub fn collaborators(popup_delay: Duration, confirm: ConfirmPolicy) -> Collaborators {
    Collaborators::default()
        .with_progress(ConsoleProgress::new(io::stderr(), popup_delay))
        .with_operator(ConsoleOperator::new(io::stderr(), confirm))
        .with_diagnostics(ConsoleDiagnostics::new(io::stderr()))
}

/// Progress display that only appears once an operation has run for
/// `delay`, or as soon as something important is logged.
///
/// Output held back while hidden is written when the display appears and
/// dropped if the operation finishes first.
#[derive(Debug)]
pub struct ConsoleProgress<W> {
    out: W,
    delay: Duration,
    started: Option<(String, Instant)>,
    visible: bool,
    held: Vec<String>,
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W, delay: Duration) -> Self {
        Self {
            out,
            delay,
            started: None,
            visible: false,
            held: Vec::new(),
        }
    }

    fn emit(&mut self, line: String) {
        if !self.visible {
            if !self.due() {
                self.held.push(line);
                return;
            }
            self.show();
        }
        let _ = writeln!(self.out, "{line}");
    }

    fn due(&self) -> bool {
        self.started
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() >= self.delay)
    }

    fn show(&mut self) {
        if self.visible {
            return;
        }
        self.visible = true;
        if let Some((label, _)) = &self.started {
            let _ = writeln!(self.out, "[{label}] running...");
        }
        for line in self.held.drain(..) {
            let _ = writeln!(self.out, "{line}");
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressSink for ConsoleProgress<W> {
    fn start(&mut self, label: &str) {
        self.started = Some((label.to_string(), Instant::now()));
        self.visible = self.delay.is_zero();
        self.held.clear();
        if self.visible {
            let _ = writeln!(self.out, "[{label}] running...");
        }
    }

    fn set_progress(&mut self, text: &str) {
        let line = match &self.started {
            Some((label, _)) => format!("[{label}] {text}"),
            None => text.to_string(),
        };
        self.emit(line);
    }

    fn append_log(&mut self, text: &str) {
        self.emit(text.to_string());
    }

    fn force_visible(&mut self) {
        self.show();
    }

    fn tick(&mut self) {
        if !self.visible && self.due() {
            self.show();
            let _ = self.out.flush();
        }
    }

    fn done(&mut self) {
        if let Some((label, at)) = self.started.take() {
            if self.visible {
                let _ = writeln!(self.out, "[{label}] done in {:.1?}", at.elapsed());
            }
        }
        self.visible = false;
        self.held.clear();
        let _ = self.out.flush();
    }
}

/// Prints alerts and answers confirmations from a fixed policy.
#[derive(Debug)]
pub struct ConsoleOperator<W> {
    out: W,
    policy: ConfirmPolicy,
}

impl<W: Write> ConsoleOperator<W> {
    pub fn new(out: W, policy: ConfirmPolicy) -> Self {
        Self { out, policy }
    }
}

impl<W: Write> Operator for ConsoleOperator<W> {
    fn alert(&mut self, kind: AlertKind, text: &str) {
        let _ = writeln!(self.out, "!! {kind}: {text}");
    }

    fn confirm(&mut self, question: &str) -> bool {
        let answer = self.policy == ConfirmPolicy::Yes;
        let _ = writeln!(
            self.out,
            "?? {question} [{}]",
            if answer { "yes" } else { "no" }
        );
        answer
    }
}

/// Passes worker stderr through and flags protocol violations.
#[derive(Debug)]
pub struct ConsoleDiagnostics<W> {
    out: W,
}

impl<W: Write> ConsoleDiagnostics<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Diagnostics for ConsoleDiagnostics<W> {
    fn invalid_input(&mut self, violation: &ProtocolViolation) {
        let _ = writeln!(self.out, "stdiolink: {violation}");
    }

    fn worker_stderr(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}
