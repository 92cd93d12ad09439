use std::fmt;

use serde_json::{Map, Value};
use tracing::trace;

use crate::protocol::{
    ReportKind, KEY_DATA, KEY_DO, KEY_DONE, KEY_GUI, KEY_OBJECT, KEY_REPORT, KEY_TEXT,
};

/// A decoded incoming frame.
///
/// Classification is by marker key, in fixed priority order:
/// `DONE`, then `REPORT`, then `GUI`. The first marker present wins.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// The outstanding command has finished.
    Completion(Completion),
    /// Out-of-band status for the running command.
    Report(Report),
    /// A request to act on the user interface.
    Gui(GuiCommand),
    /// A JSON object carrying none of the markers.
    Unrecognized(Unrecognized),
    /// Not JSON, or JSON that is not an object.
    Malformed(Malformed),
    /// An empty or whitespace-only frame.
    Keepalive,
}

impl Message {
    /// Short name of the variant, for logs.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Message::Completion(_) => "completion",
            Message::Report(_) => "report",
            Message::Gui(_) => "gui",
            Message::Unrecognized(_) => "unrecognized",
            Message::Malformed(_) => "malformed",
            Message::Keepalive => "keepalive",
        }
    }
}

/// `{"DONE": ..., ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Value of the `DONE` key, opaque to the protocol.
    pub done: Value,
    /// The whole decoded object, `DONE` included.
    pub fields: Map<String, Value>,
    /// Original frame text.
    pub raw: String,
}

impl Completion {
    /// The verb echoed back in `DO`, if the worker included it.
    pub fn verb(&self) -> Option<&str> {
        self.fields.get(KEY_DO).and_then(Value::as_str)
    }
}

/// `{"REPORT": <kind>, "TEXT": ..., ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub kind: ReportKind,
    /// The `TEXT` field; empty when missing or not a string.
    pub text: String,
    pub fields: Map<String, Value>,
    pub raw: String,
}

impl Report {
    /// `*<kind>* <text>`, the form used in the progress log.
    pub fn tagged_line(&self) -> String {
        format!("*{}* {}", self.kind, self.text)
    }
}

/// `{"GUI": <command>, "OBJECT": ..., "DATA": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct GuiCommand {
    pub command: String,
    pub object: Option<String>,
    /// `DATA`, or `null` when absent.
    pub data: Value,
    pub raw: String,
}

/// A well-formed object without any marker key.
#[derive(Debug, Clone, PartialEq)]
pub struct Unrecognized {
    pub fields: Map<String, Value>,
    pub raw: String,
}

/// A frame that did not decode to a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Malformed {
    /// Parser error, or which JSON type was found instead of an object.
    pub reason: String,
    /// Original frame text, invalid UTF-8 replaced.
    pub raw: String,
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n:: {}", self.reason, self.raw)
    }
}

/// Decode one frame. Never fails: every input maps to one variant.
pub fn decode(payload: &[u8]) -> Message {
    let raw = String::from_utf8_lossy(payload).into_owned();

    let value: Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(err) => {
            if raw.trim().is_empty() {
                trace!("empty frame");
                return Message::Keepalive;
            }
            return Message::Malformed(Malformed {
                reason: err.to_string(),
                raw,
            });
        }
    };

    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Message::Malformed(Malformed {
                reason: format!("not an object ({})", json_type_name(&other)),
                raw,
            })
        }
    };

    if let Some(done) = fields.get(KEY_DONE) {
        return Message::Completion(Completion {
            done: done.clone(),
            fields,
            raw,
        });
    }

    if let Some(kind) = fields.get(KEY_REPORT) {
        let kind = match kind {
            Value::String(kind) => ReportKind::from_wire(kind),
            other => ReportKind::Other(other.to_string()),
        };
        let text = fields
            .get(KEY_TEXT)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Message::Report(Report {
            kind,
            text,
            fields,
            raw,
        });
    }

    if let Some(command) = fields.get(KEY_GUI) {
        let command = match command {
            Value::String(command) => command.clone(),
            other => other.to_string(),
        };
        let object = fields
            .get(KEY_OBJECT)
            .and_then(Value::as_str)
            .map(str::to_string);
        let data = fields.get(KEY_DATA).cloned().unwrap_or(Value::Null);
        return Message::Gui(GuiCommand {
            command,
            object,
            data,
            raw,
        });
    }

    Message::Unrecognized(Unrecognized { fields, raw })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
