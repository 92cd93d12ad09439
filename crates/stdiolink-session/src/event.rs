use std::fmt;

use stdiolink_transport::ExitState;

use crate::command::Command;
use crate::message::{Completion, Malformed, Report, Unrecognized};

/// Something the caller may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The outstanding command finished; the slot is free again.
    Completed(CompletedOperation),
    /// A report was dispatched to the collaborators.
    Reported(Report),
    /// The worker broke the protocol. Already surfaced to diagnostics.
    Violation(ProtocolViolation),
    /// A queued request was refused because another command is running.
    Rejected { verb: String, pending: String },
    /// The worker process ended. Terminal for the connection.
    Exited(ExitState),
}

/// A command paired with the completion that ended it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedOperation {
    pub command: Command,
    pub completion: Completion,
}

/// Input the session could not act on.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolViolation {
    /// Not JSON, or not a JSON object.
    Malformed(Malformed),
    /// A JSON object with no known marker.
    Unrecognized(Unrecognized),
    /// A report whose kind has no handling policy.
    UnknownReport(Report),
    /// `DONE` arrived while no command was outstanding.
    UnexpectedCompletion(Completion),
    /// A frame exceeded the configured cap and was dropped.
    OversizedFrame { size: usize, max: usize },
    /// The worker closed its output in the middle of a frame.
    TruncatedFrame { raw: String },
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolViolation::Malformed(bad) => write!(f, "invalid input: {bad}"),
            ProtocolViolation::Unrecognized(msg) => write!(f, "unknown message\n:: {}", msg.raw),
            ProtocolViolation::UnknownReport(report) => {
                write!(f, "unknown report {}\n:: {}", report.kind, report.raw)
            }
            ProtocolViolation::UnexpectedCompletion(done) => write!(
                f,
                "completion received with no operation in progress\n:: {}",
                done.raw
            ),
            ProtocolViolation::OversizedFrame { size, max } => {
                write!(f, "frame too large ({size} bytes, max {max}), discarded")
            }
            ProtocolViolation::TruncatedFrame { raw } => {
                write!(f, "worker output ended mid-frame\n:: {raw}")
            }
        }
    }
}
