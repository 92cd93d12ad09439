use std::fmt;

/// Outgoing: command verb.
pub const KEY_DO: &str = "DO";
/// Incoming: completion marker. Its value is passed through untouched.
pub const KEY_DONE: &str = "DONE";
/// Incoming: report marker, valued with the report kind.
pub const KEY_REPORT: &str = "REPORT";
/// Incoming: report text.
pub const KEY_TEXT: &str = "TEXT";
/// Incoming: GUI command marker, valued with the command name.
pub const KEY_GUI: &str = "GUI";
/// Incoming: GUI command target object.
pub const KEY_OBJECT: &str = "OBJECT";
/// Incoming: GUI command payload.
pub const KEY_DATA: &str = "DATA";
/// Outgoing: quit without saving.
pub const KEY_FORCE: &str = "FORCE";

/// Control verb: interrupt the running operation.
pub const VERB_CANCEL: &str = "CANCEL";
/// Control verb: shut the worker down.
pub const VERB_QUIT: &str = "QUIT";

/// Kind of a `REPORT` message.
///
/// Unknown kinds are kept verbatim in [`ReportKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Progress,
    Error,
    Warning,
    Notice,
    Info,
    Bug,
    QuitUnsaved,
    BackendBusy,
    Other(String),
}

impl ReportKind {
    /// Map a wire string to a kind. Total: every string has a kind.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "PROGRESS" => ReportKind::Progress,
            "Error" => ReportKind::Error,
            "Warning" => ReportKind::Warning,
            "Notice" => ReportKind::Notice,
            "Info" => ReportKind::Info,
            "Bug" => ReportKind::Bug,
            "QUIT_UNSAVED?" => ReportKind::QuitUnsaved,
            "BACKEND_BUSY" => ReportKind::BackendBusy,
            other => ReportKind::Other(other.to_string()),
        }
    }

    /// The wire string for this kind.
    pub fn as_wire(&self) -> &str {
        match self {
            ReportKind::Progress => "PROGRESS",
            ReportKind::Error => "Error",
            ReportKind::Warning => "Warning",
            ReportKind::Notice => "Notice",
            ReportKind::Info => "Info",
            ReportKind::Bug => "Bug",
            ReportKind::QuitUnsaved => "QUIT_UNSAVED?",
            ReportKind::BackendBusy => "BACKEND_BUSY",
            ReportKind::Other(other) => other,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_map_both_ways() {
        for wire in [
            "PROGRESS",
            "Error",
            "Warning",
            "Notice",
            "Info",
            "Bug",
            "QUIT_UNSAVED?",
            "BACKEND_BUSY",
        ] {
            let kind = ReportKind::from_wire(wire);
            assert!(!matches!(kind, ReportKind::Other(_)), "{wire}");
            assert_eq!(kind.as_wire(), wire);
        }
    }

    #[test]
    fn kinds_are_case_sensitive() {
        assert_eq!(
            ReportKind::from_wire("error"),
            ReportKind::Other("error".to_string())
        );
        assert_eq!(
            ReportKind::from_wire("progress"),
            ReportKind::Other("progress".to_string())
        );
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let kind = ReportKind::from_wire("SOMETHING_NEW");
        assert_eq!(kind.to_string(), "SOMETHING_NEW");
        assert_eq!(kind, ReportKind::Other("SOMETHING_NEW".to_string()));
    }
}
