use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::process::ChildStdin;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use stdiolink_transport::{ExitState, WorkerProcess, WorkerSpec};
use tracing::{debug, trace, warn};

use crate::collab::Collaborators;
use crate::command::Command;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::event::{CompletedOperation, SessionEvent};
use crate::session::Session;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// How long [`BackendConnection::shutdown`] waits after the termination
/// signal before killing the worker.
pub const TERMINATE_GRACE: Duration = Duration::from_millis(500);

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Longest wait between progress ticks while a command is outstanding.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// A request queued from another thread through a [`RequestHandle`].
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Send(Command),
    Cancel,
    Quit { force: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn name(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

/// Everything the owner drains, in arrival order.
#[derive(Debug)]
enum Inbound {
    Data(Stream, Vec<u8>),
    Closed(Stream),
    Request(Request),
}

/// Cloneable handle for queueing requests from any thread.
///
/// Requests are applied by the connection's owner the next time it
/// drains events. A refused `Send` shows up there as
/// [`SessionEvent::Rejected`].
#[derive(Debug, Clone)]
pub struct RequestHandle {
    tx: Sender<Inbound>,
}

impl RequestHandle {
    /// Queue any request.
    pub fn submit(&self, request: Request) -> Result<()> {
        self.tx
            .send(Inbound::Request(request))
            .map_err(|_| SessionError::Disconnected("connection dropped".to_string()))
    }

    /// Queue a command.
    pub fn send(&self, command: Command) -> Result<()> {
        self.submit(Request::Send(command))
    }

    /// Queue a cancellation.
    pub fn cancel(&self) -> Result<()> {
        self.submit(Request::Cancel)
    }

    /// Queue a quit request.
    pub fn request_quit(&self, force: bool) -> Result<()> {
        self.submit(Request::Quit { force })
    }
}

/// A spawned worker and the session talking to it.
///
/// Two reader threads move raw bytes from stdout and stderr into one
/// queue. The thread holding the `BackendConnection` drains that queue
/// with [`next_events`](Self::next_events); framing, decoding and the
/// operation slot are only ever touched there.
pub struct BackendConnection {
    process: WorkerProcess,
    session: Session<ChildStdin>,
    tx: Sender<Inbound>,
    rx: Receiver<Inbound>,
    stdout_open: bool,
    stderr_open: bool,
    backlog: VecDeque<SessionEvent>,
}

impl BackendConnection {
    /// Spawn the worker with default session configuration.
    pub fn spawn(spec: &WorkerSpec, collab: Collaborators) -> Result<Self> {
        Self::spawn_with_config(spec, collab, SessionConfig::default())
    }

    /// Spawn the worker with explicit configuration.
    pub fn spawn_with_config(
        spec: &WorkerSpec,
        collab: Collaborators,
        config: SessionConfig,
    ) -> Result<Self> {
        let mut process = WorkerProcess::spawn(spec)?;
        let pipes = process.take_pipes()?;
        let (tx, rx) = mpsc::channel();

        spawn_reader(pipes.stdout, Stream::Stdout, tx.clone())?;
        spawn_reader(pipes.stderr, Stream::Stderr, tx.clone())?;

        Ok(Self {
            process,
            session: Session::with_config(pipes.stdin, collab, config),
            tx,
            rx,
            stdout_open: true,
            stderr_open: true,
            backlog: VecDeque::new(),
        })
    }

    /// Handle for queueing requests from other threads.
    pub fn handle(&self) -> RequestHandle {
        RequestHandle {
            tx: self.tx.clone(),
        }
    }

    /// Start a command now. Fails with `Busy` while one is running.
    pub fn send(&mut self, command: Command) -> Result<()> {
        self.ensure_alive()?;
        self.session.send(command)
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.session.cancel()
    }

    pub fn request_quit(&mut self, force: bool) -> Result<()> {
        self.ensure_alive()?;
        self.session.request_quit(force)
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    /// OS process id of the worker.
    pub fn pid(&self) -> u32 {
        self.process.id()
    }

    /// How the worker ended, once [`SessionEvent::Exited`] was produced.
    pub fn exit_state(&self) -> Option<ExitState> {
        self.session.exit_state()
    }

    /// Mutable access to the collaborators.
    pub fn collaborators_mut(&mut self) -> &mut Collaborators {
        self.session.collaborators_mut()
    }

    /// Wait for worker activity and apply it.
    ///
    /// Blocks until something arrives or `timeout` passes (`None` waits
    /// indefinitely), then applies everything already queued. An empty
    /// result means the timeout expired. After
    /// [`SessionEvent::Exited`] has been returned, further calls fail
    /// with `Disconnected`.
    pub fn next_events(&mut self, timeout: Option<Duration>) -> Result<Vec<SessionEvent>> {
        if !self.backlog.is_empty() {
            return Ok(self.backlog.drain(..).collect());
        }
        self.ensure_alive()?;
        self.pump(timeout)
    }

    /// Drive the connection until the running command completes.
    ///
    /// Events seen on the way have already reached the collaborators;
    /// any that arrive after the completion are kept for
    /// [`next_events`](Self::next_events).
    pub fn wait_for_completion(&mut self, timeout: Option<Duration>) -> Result<CompletedOperation> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            while let Some(event) = self.backlog.pop_front() {
                match event {
                    SessionEvent::Completed(done) => return Ok(done),
                    SessionEvent::Exited(state) => {
                        return Err(SessionError::Disconnected(format!(
                            "worker exited before completing ({state})"
                        )))
                    }
                    _ => {}
                }
            }

            self.ensure_alive()?;
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(SessionError::Timeout(timeout.unwrap_or_default()));
                    }
                    Some(deadline - now)
                }
                None => None,
            };
            let events = self.pump(remaining)?;
            self.backlog.extend(events);
        }
    }

    /// Ask the worker to quit and wait up to `grace` for it to exit.
    ///
    /// A worker still running after that is sent a termination signal
    /// and given [`TERMINATE_GRACE`] more before it is killed.
    pub fn shutdown(&mut self, grace: Duration) -> Result<ExitState> {
        if let Some(state) = self.session.exit_state() {
            return Ok(state);
        }
        if let Err(err) = self.session.request_quit(false) {
            debug!(error = %err, "quit request not delivered");
        }
        if let Some(state) = self.settle(grace)? {
            return Ok(state);
        }

        warn!(pid = self.process.id(), "worker ignored quit request; terminating");
        if let Err(err) = self.process.terminate() {
            debug!(error = %err, "terminate failed");
        }
        if let Some(state) = self.settle(TERMINATE_GRACE)? {
            return Ok(state);
        }

        warn!(pid = self.process.id(), "worker ignored termination; killing");
        self.kill()
    }

    /// Kill the worker now and reap it.
    pub fn kill(&mut self) -> Result<ExitState> {
        if let Some(state) = self.session.exit_state() {
            return Ok(state);
        }
        self.process.kill()?;
        let state = self.process.wait()?;
        let event = self.session.on_exit(state);
        self.backlog.push_back(event);
        Ok(state)
    }

    fn pump(&mut self, timeout: Option<Duration>) -> Result<Vec<SessionEvent>> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut events = Vec::new();

        if self.stdout_open || self.stderr_open {
            let Some(first) = self.recv_inbound(deadline)? else {
                return Ok(events);
            };
            self.apply(first, &mut events)?;
        }
        while let Ok(inbound) = self.rx.try_recv() {
            self.apply(inbound, &mut events)?;
        }

        if !self.stdout_open && !self.stderr_open && self.session.exit_state().is_none() {
            if let Some(state) = self.reap(deadline)? {
                events.push(self.session.on_exit(state));
            }
        }
        Ok(events)
    }

    /// Next queued item, or `None` once `deadline` passes.
    ///
    /// While a command is outstanding the wait is cut into
    /// [`TICK_INTERVAL`] slices so progress can tick between reports.
    fn recv_inbound(&mut self, deadline: Option<Instant>) -> Result<Option<Inbound>> {
        loop {
            let mut wait = deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
            if self.session.is_busy() {
                wait = Some(wait.map_or(TICK_INTERVAL, |wait| wait.min(TICK_INTERVAL)));
            }
            let received = match wait {
                Some(wait) => self.rx.recv_timeout(wait),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(inbound) => return Ok(Some(inbound)),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SessionError::Disconnected("event queue closed".to_string()))
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.session.tick();
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Wait for the worker to exit, but not past `deadline`.
    fn reap(&mut self, deadline: Option<Instant>) -> Result<Option<ExitState>> {
        let Some(deadline) = deadline else {
            return Ok(Some(self.process.wait()?));
        };
        loop {
            if let Some(state) = self.process.try_wait()? {
                return Ok(Some(state));
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(pid = self.process.id(), "worker closed its streams but is still running");
                return Ok(None);
            }
            thread::sleep(REAP_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Drain events until the worker exits or `grace` passes.
    ///
    /// Polls the process too, so a worker whose streams are held open by
    /// a descendant still counts as exited.
    fn settle(&mut self, grace: Duration) -> Result<Option<ExitState>> {
        let deadline = Instant::now() + grace;
        loop {
            if let Some(state) = self.session.exit_state() {
                return Ok(Some(state));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let events = self.pump(Some(REAP_POLL_INTERVAL.min(deadline - now)))?;
            let quiet = events.is_empty();
            self.backlog.extend(events);
            if quiet && self.session.exit_state().is_none() {
                if let Some(state) = self.process.try_wait()? {
                    let event = self.session.on_exit(state);
                    self.backlog.push_back(event);
                }
            }
        }
    }

    fn apply(&mut self, inbound: Inbound, events: &mut Vec<SessionEvent>) -> Result<()> {
        match inbound {
            Inbound::Data(Stream::Stdout, bytes) => events.extend(self.session.feed_output(&bytes)),
            Inbound::Data(Stream::Stderr, bytes) => self.session.feed_error(&bytes),
            Inbound::Closed(Stream::Stdout) => {
                self.stdout_open = false;
                events.extend(self.session.close_output());
            }
            Inbound::Closed(Stream::Stderr) => {
                self.stderr_open = false;
                self.session.close_error();
            }
            Inbound::Request(request) => self.apply_request(request, events)?,
        }
        Ok(())
    }

    fn apply_request(&mut self, request: Request, events: &mut Vec<SessionEvent>) -> Result<()> {
        if self.session.exit_state().is_some() {
            debug!(?request, "dropping request for exited worker");
            return Ok(());
        }
        let result = match request {
            Request::Send(command) => self.session.send(command),
            Request::Cancel => self.session.cancel(),
            Request::Quit { force } => self.session.request_quit(force),
        };
        match result {
            Ok(()) => Ok(()),
            Err(SessionError::Busy { verb, pending }) => {
                events.push(SessionEvent::Rejected { verb, pending });
                Ok(())
            }
            // Only the worker's exit ends the connection; it arrives through the readers.
            Err(SessionError::Frame(err)) => {
                warn!(error = %err, "worker stdin unusable; request dropped");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        match self.session.exit_state() {
            Some(state) => Err(SessionError::Disconnected(format!("worker exited ({state})"))),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for BackendConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConnection")
            .field("process", &self.process)
            .field("session", &self.session)
            .field("stdout_open", &self.stdout_open)
            .field("stderr_open", &self.stderr_open)
            .finish_non_exhaustive()
    }
}

fn spawn_reader<R>(mut stream: R, which: Stream, tx: Sender<Inbound>) -> Result<()>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("stdiolink-{}", which.name()))
        .spawn(move || {
            let mut buffer = vec![0u8; READ_BUFFER_SIZE];
            loop {
                match stream.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        trace!(stream = which.name(), size = n, "read");
                        if tx.send(Inbound::Data(which, buffer[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        debug!(stream = which.name(), error = %err, "read failed");
                        break;
                    }
                }
            }
            let _ = tx.send(Inbound::Closed(which));
        })?;
    Ok(())
}
