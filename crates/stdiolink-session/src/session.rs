use std::io::Write;

use stdiolink_frame::{FrameError, LineFramer};
use stdiolink_transport::ExitState;
use tracing::{debug, info, warn};

use crate::collab::Collaborators;
use crate::command::Command;
use crate::config::SessionConfig;
use crate::controller::OperationController;
use crate::error::Result;
use crate::event::{ProtocolViolation, SessionEvent};
use crate::message::decode;
use crate::monitor::ErrorStreamMonitor;

/// One worker connection, driven by whoever owns it.
///
/// Combines the framer for stdout, the operation controller writing to
/// stdin, and the stderr monitor. Every method takes `&mut self`, so all
/// buffer and slot mutation happens in one sequence. Bytes are pushed in
/// with [`feed_output`](Self::feed_output) and
/// [`feed_error`](Self::feed_error); nothing here reads or blocks.
pub struct Session<W> {
    framer: LineFramer,
    controller: OperationController<W>,
    monitor: ErrorStreamMonitor,
    exited: Option<ExitState>,
}

impl<W: Write> Session<W> {
    /// Session with default configuration.
    pub fn new(stdin: W, collab: Collaborators) -> Self {
        Self::with_config(stdin, collab, SessionConfig::default())
    }

    /// Session with explicit configuration.
    pub fn with_config(stdin: W, collab: Collaborators, config: SessionConfig) -> Self {
        Self {
            framer: LineFramer::with_config(config.frame),
            controller: OperationController::with_config(stdin, collab, &config),
            monitor: ErrorStreamMonitor::new(),
            exited: None,
        }
    }

    /// Start a command; see [`OperationController::send`].
    pub fn send(&mut self, command: Command) -> Result<()> {
        self.controller.send(command)
    }

    /// Ask the worker to cancel the running command.
    pub fn cancel(&mut self) -> Result<()> {
        self.controller.cancel()
    }

    /// Ask the worker to quit.
    pub fn request_quit(&mut self, force: bool) -> Result<()> {
        self.controller.request_quit(force)
    }

    pub fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }

    pub fn current(&self) -> Option<&Command> {
        self.controller.current()
    }

    /// Let time-based progress policies run while a command is outstanding.
    pub fn tick(&mut self) {
        if self.is_busy() {
            self.controller.collaborators_mut().progress.tick();
        }
    }

    /// How the worker ended, once [`on_exit`](Self::on_exit) has run.
    pub fn exit_state(&self) -> Option<ExitState> {
        self.exited
    }

    /// Push bytes read from the worker's stdout.
    ///
    /// Every frame completed by these bytes is decoded and applied in
    /// order. Oversized frames become violations; nothing here fails, so
    /// every event the bytes produce reaches the caller.
    pub fn feed_output(&mut self, bytes: &[u8]) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for frame in self.framer.feed(bytes) {
            match frame {
                Ok(frame) => events.extend(self.controller.on_message(decode(&frame.payload))),
                Err(FrameError::FrameTooLarge { size, max }) => {
                    events.push(
                        self.controller
                            .violation(ProtocolViolation::OversizedFrame { size, max }),
                    );
                }
                Err(err) => warn!(error = %err, "frame skipped"),
            }
        }
        events
    }

    /// Push bytes read from the worker's stderr.
    pub fn feed_error(&mut self, bytes: &[u8]) {
        let diagnostics = &mut *self.controller.collaborators_mut().diagnostics;
        self.monitor.forward(bytes, diagnostics);
    }

    /// The worker closed stdout. An unterminated tail is reported.
    pub fn close_output(&mut self) -> Option<SessionEvent> {
        let tail = self.framer.take_remainder()?;
        let raw = String::from_utf8_lossy(&tail).into_owned();
        if raw.trim().is_empty() {
            return None;
        }
        Some(
            self.controller
                .violation(ProtocolViolation::TruncatedFrame { raw }),
        )
    }

    /// The worker closed stderr.
    pub fn close_error(&mut self) {
        let diagnostics = &mut *self.controller.collaborators_mut().diagnostics;
        self.monitor.finish(diagnostics);
    }

    /// The worker process ended.
    ///
    /// A still-outstanding command is abandoned. Later sends fail with
    /// [`SessionError::Disconnected`](crate::SessionError::Disconnected)
    /// once the owner stops accepting them.
    pub fn on_exit(&mut self, state: ExitState) -> SessionEvent {
        if let Some(command) = self.controller.abandon() {
            debug!(verb = command.verb(), %state, "worker exited mid-operation");
        }
        info!(%state, "worker exited");
        self.exited = Some(state);
        SessionEvent::Exited(state)
    }

    /// Mutable access to the collaborators.
    pub fn collaborators_mut(&mut self) -> &mut Collaborators {
        self.controller.collaborators_mut()
    }

    /// Borrow the command stream.
    pub fn stdin(&self) -> &W {
        self.controller.get_ref()
    }
}

impl<W> std::fmt::Debug for Session<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("framer", &self.framer)
            .field("controller", &self.controller)
            .field("monitor", &self.monitor)
            .field("exited", &self.exited)
            .finish()
    }
}
