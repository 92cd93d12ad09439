use std::io::Write;

use stdiolink_frame::FrameWriter;
use tracing::{debug, trace, warn};

use crate::collab::Collaborators;
use crate::command::Command;
use crate::config::SessionConfig;
use crate::dispatch::{Dispatch, ReportDispatcher};
use crate::error::{Result, SessionError};
use crate::event::{CompletedOperation, ProtocolViolation, SessionEvent};
use crate::message::Message;
use crate::protocol::ReportKind;

/// Owns the single in-flight operation slot.
///
/// Idle until [`send`](Self::send) succeeds, Busy until the matching
/// completion arrives. A second `send` while Busy is refused without
/// writing anything. `CANCEL` and `QUIT` bypass the slot.
pub struct OperationController<W> {
    writer: FrameWriter<W>,
    slot: Option<Command>,
    collab: Collaborators,
    dispatcher: ReportDispatcher,
}

impl<W: Write> OperationController<W> {
    /// Controller writing to `stdin` with default configuration.
    pub fn new(stdin: W, collab: Collaborators) -> Self {
        Self::with_config(stdin, collab, &SessionConfig::default())
    }

    /// Controller with explicit configuration.
    pub fn with_config(stdin: W, collab: Collaborators, config: &SessionConfig) -> Self {
        Self {
            writer: FrameWriter::with_config(stdin, config.frame),
            slot: None,
            collab,
            dispatcher: ReportDispatcher::new(config.quit_question.clone()),
        }
    }

    /// True while a command is outstanding.
    pub fn is_busy(&self) -> bool {
        self.slot.is_some()
    }

    /// The outstanding command, if any.
    pub fn current(&self) -> Option<&Command> {
        self.slot.as_ref()
    }

    /// Start `command`. Refused with [`SessionError::Busy`] while another
    /// command is outstanding. Control verbs are written without taking
    /// the slot.
    pub fn send(&mut self, command: Command) -> Result<()> {
        if command.is_control() {
            return self.write_control(&command);
        }

        if let Some(pending) = &self.slot {
            debug!(
                verb = command.verb(),
                pending = pending.verb(),
                "rejected command while busy"
            );
            return Err(SessionError::Busy {
                verb: command.verb().to_string(),
                pending: pending.verb().to_string(),
            });
        }

        let payload = command.to_wire()?;
        self.writer.send(&payload)?;
        debug!(verb = command.verb(), size = payload.len(), "sent command");

        self.collab.progress.start(command.verb());
        self.slot = Some(command);
        Ok(())
    }

    /// Ask the worker to abandon the current operation.
    ///
    /// Always permitted. The slot stays taken until the worker completes.
    pub fn cancel(&mut self) -> Result<()> {
        self.write_control(&Command::cancel())
    }

    /// Ask the worker to quit; `force` discards unsaved changes.
    pub fn request_quit(&mut self, force: bool) -> Result<()> {
        self.write_control(&Command::quit(force))
    }

    /// Apply one decoded message.
    ///
    /// Never fails. A confirmed forced quit that cannot be written is
    /// logged; the worker's exit or a closed stream reports the rest.
    pub fn on_message(&mut self, message: Message) -> Option<SessionEvent> {
        trace!(variant = message.variant_name(), "message");
        match message {
            Message::Completion(completion) => match self.slot.take() {
                Some(command) => {
                    debug!(verb = command.verb(), "operation completed");
                    self.collab.progress.done();
                    Some(SessionEvent::Completed(CompletedOperation {
                        command,
                        completion,
                    }))
                }
                None => Some(self.violation(ProtocolViolation::UnexpectedCompletion(completion))),
            },
            Message::Report(report) => {
                if self.dispatcher.dispatch(&report, &mut self.collab) == Dispatch::QuitConfirmed {
                    if let Err(err) = self.request_quit(true) {
                        warn!(error = %err, "forced quit not delivered");
                    }
                }
                if matches!(report.kind, ReportKind::Other(_)) {
                    return Some(self.violation(ProtocolViolation::UnknownReport(report)));
                }
                Some(SessionEvent::Reported(report))
            }
            Message::Gui(command) => {
                self.collab.gui.execute(&command);
                None
            }
            Message::Unrecognized(unknown) => {
                Some(self.violation(ProtocolViolation::Unrecognized(unknown)))
            }
            Message::Malformed(bad) => Some(self.violation(ProtocolViolation::Malformed(bad))),
            Message::Keepalive => None,
        }
    }

    /// Surface a violation to diagnostics and wrap it as an event.
    pub fn violation(&mut self, violation: ProtocolViolation) -> SessionEvent {
        warn!("protocol violation: {violation}");
        self.collab.diagnostics.invalid_input(&violation);
        SessionEvent::Violation(violation)
    }

    /// Free the slot without a completion, after the worker died.
    ///
    /// Returns the abandoned command.
    pub fn abandon(&mut self) -> Option<Command> {
        let command = self.slot.take()?;
        warn!(verb = command.verb(), "operation abandoned");
        self.collab.progress.done();
        Some(command)
    }

    /// Mutable access to the collaborators.
    pub fn collaborators_mut(&mut self) -> &mut Collaborators {
        &mut self.collab
    }

    /// Borrow the command stream.
    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    fn write_control(&mut self, command: &Command) -> Result<()> {
        let payload = command.to_wire()?;
        self.writer.send(&payload)?;
        debug!(
            verb = command.verb(),
            busy = self.slot.is_some(),
            "sent control command"
        );
        Ok(())
    }
}

impl<W> std::fmt::Debug for OperationController<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationController")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}
