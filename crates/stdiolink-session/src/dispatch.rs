use tracing::{debug, warn};

use crate::collab::{AlertKind, Collaborators};
use crate::config::DEFAULT_QUIT_QUESTION;
use crate::message::Report;
use crate::protocol::ReportKind;

/// What the caller must do after a report was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing further.
    Handled,
    /// The operator agreed to discard unsaved changes; send a forced quit.
    QuitConfirmed,
}

/// Routes each report kind to its handling policy.
///
/// | kind | action |
/// |---|---|
/// | `PROGRESS` | set progress text |
/// | `Error` / `Warning` / `Notice` | force visible, append tagged line |
/// | `Info` | append tagged line |
/// | `Bug` | blocking alert with the text |
/// | `QUIT_UNSAVED?` | confirm, then ask for a forced quit |
/// | `BACKEND_BUSY` | alert with the raw frame |
/// | anything else | "unknown report" alert with the raw frame |
#[derive(Debug, Clone)]
pub struct ReportDispatcher {
    quit_question: String,
}

impl ReportDispatcher {
    /// Dispatcher asking `quit_question` on `QUIT_UNSAVED?`.
    pub fn new(quit_question: impl Into<String>) -> Self {
        Self {
            quit_question: quit_question.into(),
        }
    }

    /// Apply the policy for `report`.
    pub fn dispatch(&self, report: &Report, collab: &mut Collaborators) -> Dispatch {
        debug!(kind = %report.kind, "dispatching report");
        match &report.kind {
            ReportKind::Progress => {
                collab.progress.set_progress(&report.text);
            }
            ReportKind::Error | ReportKind::Warning | ReportKind::Notice => {
                collab.progress.force_visible();
                collab.progress.append_log(&report.tagged_line());
            }
            ReportKind::Info => {
                collab.progress.append_log(&report.tagged_line());
            }
            ReportKind::Bug => {
                collab.operator.alert(AlertKind::Bug, &report.text);
            }
            ReportKind::QuitUnsaved => {
                if collab.operator.confirm(&self.quit_question) {
                    return Dispatch::QuitConfirmed;
                }
            }
            ReportKind::BackendBusy => {
                // The worker saw a second command while busy; both sides
                // should have agreed it was busy.
                warn!(raw = %report.raw, "worker reported busy");
                collab.operator.alert(AlertKind::BackendBusy, &report.raw);
            }
            ReportKind::Other(kind) => {
                warn!(kind = %kind, "unknown report kind");
                collab.operator.alert(AlertKind::UnknownReport, &report.raw);
            }
        }
        Dispatch::Handled
    }
}

impl Default for ReportDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_QUIT_QUESTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::testing::{Call, Recorder};
    use crate::message::{decode, Message};

    fn report(line: &str) -> Report {
        match decode(line.as_bytes()) {
            Message::Report(report) => report,
            other => panic!("expected report, got {other:?}"),
        }
    }

    fn dispatch(line: &str, recorder: &Recorder) -> Dispatch {
        let mut collab = recorder.collaborators();
        ReportDispatcher::default().dispatch(&report(line), &mut collab)
    }

    #[test]
    fn progress_sets_text() {
        let rec = Recorder::default();
        let outcome = dispatch(r#"{"REPORT":"PROGRESS","TEXT":"50%"}"#, &rec);
        assert_eq!(outcome, Dispatch::Handled);
        assert_eq!(rec.calls(), vec![Call::SetProgress("50%".to_string())]);
    }

    #[test]
    fn error_warning_notice_force_visibility() {
        for kind in ["Error", "Warning", "Notice"] {
            let rec = Recorder::default();
            dispatch(&format!(r#"{{"REPORT":"{kind}","TEXT":"disk full"}}"#), &rec);
            assert_eq!(
                rec.calls(),
                vec![
                    Call::ForceVisible,
                    Call::AppendLog(format!("*{kind}* disk full")),
                ]
            );
        }
    }

    #[test]
    fn info_appends_without_forcing() {
        let rec = Recorder::default();
        dispatch(r#"{"REPORT":"Info","TEXT":"loaded 12 rooms"}"#, &rec);
        assert_eq!(
            rec.calls(),
            vec![Call::AppendLog("*Info* loaded 12 rooms".to_string())]
        );
    }

    #[test]
    fn bug_raises_alert_with_text() {
        let rec = Recorder::default();
        dispatch(r#"{"REPORT":"Bug","TEXT":"index out of range"}"#, &rec);
        assert_eq!(
            rec.calls(),
            vec![Call::Alert(
                AlertKind::Bug,
                "index out of range".to_string()
            )]
        );
    }

    #[test]
    fn quit_unsaved_confirmed() {
        let rec = Recorder::answering(true);
        let outcome = dispatch(r#"{"REPORT":"QUIT_UNSAVED?"}"#, &rec);
        assert_eq!(outcome, Dispatch::QuitConfirmed);
        assert_eq!(
            rec.calls(),
            vec![Call::Confirm(DEFAULT_QUIT_QUESTION.to_string())]
        );
    }

    #[test]
    fn quit_unsaved_declined() {
        let rec = Recorder::answering(false);
        let outcome = dispatch(r#"{"REPORT":"QUIT_UNSAVED?"}"#, &rec);
        assert_eq!(outcome, Dispatch::Handled);
    }

    #[test]
    fn custom_quit_question() {
        let rec = Recorder::answering(false);
        let mut collab = rec.collaborators();
        ReportDispatcher::new("Lose edits?")
            .dispatch(&report(r#"{"REPORT":"QUIT_UNSAVED?"}"#), &mut collab);
        assert_eq!(rec.calls(), vec![Call::Confirm("Lose edits?".to_string())]);
    }

    #[test]
    fn backend_busy_alerts_raw_frame() {
        let rec = Recorder::default();
        let line = r#"{"REPORT":"BACKEND_BUSY","DATA":{"DO":"LOAD"}}"#;
        dispatch(line, &rec);
        assert_eq!(
            rec.calls(),
            vec![Call::Alert(AlertKind::BackendBusy, line.to_string())]
        );
    }

    #[test]
    fn unknown_kind_alerts_raw_frame() {
        let rec = Recorder::default();
        let line = r#"{"REPORT":"SPARKLES","TEXT":"?"}"#;
        dispatch(line, &rec);
        assert_eq!(
            rec.calls(),
            vec![Call::Alert(AlertKind::UnknownReport, line.to_string())]
        );
    }
}
