use std::fmt;
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, ExitStatus};

use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::spec::WorkerSpec;

/// The worker's three standard streams, detached from the process handle.
#[derive(Debug)]
pub struct WorkerPipes {
    /// Commands go here.
    pub stdin: ChildStdin,
    /// Framed protocol messages come from here.
    pub stdout: ChildStdout,
    /// Free-form diagnostics come from here.
    pub stderr: ChildStderr,
}

/// How the worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    /// Normal exit with a status code.
    Code(i32),
    /// Terminated by a signal (unix).
    Signal(i32),
    /// The platform reported neither a code nor a signal.
    Unknown,
}

impl ExitState {
    /// True for a zero exit code.
    pub fn success(self) -> bool {
        matches!(self, ExitState::Code(0))
    }

    /// The exit code, if the worker exited normally.
    pub fn code(self) -> Option<i32> {
        match self {
            ExitState::Code(code) => Some(code),
            _ => None,
        }
    }
}

impl From<ExitStatus> for ExitState {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitState::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitState::Signal(signal);
            }
        }
        ExitState::Unknown
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitState::Code(code) => write!(f, "exit code {code}"),
            ExitState::Signal(signal) => write!(f, "signal {signal}"),
            ExitState::Unknown => f.write_str("unknown exit status"),
        }
    }
}

/// A spawned worker process.
///
/// The process is killed and reaped on drop if it is still running.
pub struct WorkerProcess {
    child: Child,
    program: PathBuf,
    exited: Option<ExitState>,
}

impl WorkerProcess {
    /// Spawn the worker described by `spec` with all streams piped.
    pub fn spawn(spec: &WorkerSpec) -> Result<Self> {
        let child = spec
            .to_command()
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        info!(program = ?spec.program, pid = child.id(), "worker started");

        Ok(Self {
            child,
            program: spec.program.clone(),
            exited: None,
        })
    }

    /// Detach the standard streams. Succeeds once.
    pub fn take_pipes(&mut self) -> Result<WorkerPipes> {
        let stdin = self
            .child
            .stdin
            .take()
            .ok_or(TransportError::MissingPipe("stdin"))?;
        let stdout = self
            .child
            .stdout
            .take()
            .ok_or(TransportError::MissingPipe("stdout"))?;
        let stderr = self
            .child
            .stderr
            .take()
            .ok_or(TransportError::MissingPipe("stderr"))?;
        Ok(WorkerPipes {
            stdin,
            stdout,
            stderr,
        })
    }

    /// OS process id.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Check for exit without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ExitState>> {
        if let Some(state) = self.exited {
            return Ok(Some(state));
        }
        let state = self.child.try_wait()?.map(ExitState::from);
        if let Some(state) = state {
            self.record_exit(state);
        }
        Ok(state)
    }

    /// Block until the worker exits.
    pub fn wait(&mut self) -> Result<ExitState> {
        if let Some(state) = self.exited {
            return Ok(state);
        }
        let state = ExitState::from(self.child.wait()?);
        self.record_exit(state);
        Ok(state)
    }

    /// Ask the worker to terminate (SIGTERM on unix, hard kill elsewhere).
    pub fn terminate(&mut self) -> Result<()> {
        if self.exited.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            let pid = libc::pid_t::try_from(self.child.id()).map_err(|_| {
                TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "worker pid out of range",
                ))
            })?;
            // SAFETY: `pid` refers to our own child, which has not been reaped
            // (`exited` is unset), so the id cannot have been recycled.
            let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
            if rc != 0 {
                return Err(TransportError::Io(std::io::Error::last_os_error()));
            }
            debug!(pid, "sent SIGTERM to worker");
            return Ok(());
        }

        #[cfg(not(unix))]
        {
            self.kill()
        }
    }

    /// Kill the worker immediately.
    pub fn kill(&mut self) -> Result<()> {
        if self.exited.is_some() {
            return Ok(());
        }
        match self.child.kill() {
            Ok(()) => Ok(()),
            // Already exited but not yet reaped.
            Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn record_exit(&mut self, state: ExitState) {
        self.exited = Some(state);
        if state.success() {
            info!(pid = self.child.id(), %state, "worker exited");
        } else {
            warn!(pid = self.child.id(), %state, "worker exited");
        }
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        if self.exited.is_some() {
            return;
        }
        if let Ok(None) = self.child.try_wait() {
            debug!(pid = self.child.id(), "killing worker on drop");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

impl fmt::Debug for WorkerProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerProcess")
            .field("program", &self.program)
            .field("pid", &self.child.id())
            .field("exited", &self.exited)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    #[test]
    fn spawn_missing_program_reports_spawn_error() {
        let err = WorkerProcess::spawn(&WorkerSpec::new("/nonexistent/stdiolink-worker"))
            .expect_err("spawn should fail");
        assert!(matches!(err, TransportError::Spawn { .. }));
    }

    #[test]
    fn pipes_round_trip_through_cat() {
        let mut worker = WorkerProcess::spawn(&WorkerSpec::new("cat")).expect("cat should spawn");
        let mut pipes = worker.take_pipes().expect("pipes available");

        pipes.stdin.write_all(b"ping\n").expect("write stdin");
        drop(pipes.stdin);

        let mut out = String::new();
        pipes.stdout.read_to_string(&mut out).expect("read stdout");
        assert_eq!(out, "ping\n");

        assert_eq!(worker.wait().expect("wait"), ExitState::Code(0));
    }

    #[test]
    fn pipes_can_only_be_taken_once() {
        let mut worker = WorkerProcess::spawn(&WorkerSpec::new("cat")).expect("cat should spawn");
        let _pipes = worker.take_pipes().expect("first take");
        let err = worker.take_pipes().expect_err("second take should fail");
        assert!(matches!(err, TransportError::MissingPipe("stdin")));
        worker.kill().expect("kill");
    }

    #[test]
    fn exit_code_is_reported() {
        let spec = WorkerSpec::new("sh").args(["-c", "exit 3"]);
        let mut worker = WorkerProcess::spawn(&spec).expect("sh should spawn");
        let state = worker.wait().expect("wait");
        assert_eq!(state, ExitState::Code(3));
        assert_eq!(state.code(), Some(3));
        assert!(!state.success());
        assert_eq!(worker.try_wait().expect("try_wait"), Some(state));
    }

    #[test]
    fn terminate_delivers_sigterm() {
        let spec = WorkerSpec::new("sleep").arg("30");
        let mut worker = WorkerProcess::spawn(&spec).expect("sleep should spawn");
        worker.terminate().expect("terminate");
        let state = worker.wait().expect("wait");
        assert_eq!(state, ExitState::Signal(libc::SIGTERM));
        assert_eq!(state.to_string(), format!("signal {}", libc::SIGTERM));
    }
}
