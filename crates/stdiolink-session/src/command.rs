use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::error::{Result, SessionError};
use crate::protocol::{KEY_DO, KEY_FORCE, VERB_CANCEL, VERB_QUIT};

/// An outgoing request: a verb plus arbitrary parameters.
///
/// Serializes to a single JSON object with `"DO"` first:
/// `{"DO": <verb>, ...params}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    verb: String,
    params: Map<String, Value>,
}

impl Command {
    /// A command with no parameters.
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            params: Map::new(),
        }
    }

    /// Add a parameter. A `"DO"` key is ignored; the verb is fixed.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != KEY_DO {
            self.params.insert(key, value.into());
        }
        self
    }

    /// `{"DO":"CANCEL"}`.
    pub fn cancel() -> Self {
        Self::new(VERB_CANCEL)
    }

    /// `{"DO":"QUIT","FORCE":<force>}`.
    pub fn quit(force: bool) -> Self {
        Self::new(VERB_QUIT).with_param(KEY_FORCE, force)
    }

    /// Build a command from a decoded JSON object with a string `"DO"`.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut params) = value else {
            return Err(SessionError::InvalidCommand(
                "command must be a JSON object".to_string(),
            ));
        };
        let verb = match params.remove(KEY_DO) {
            Some(Value::String(verb)) if !verb.is_empty() => verb,
            Some(_) => {
                return Err(SessionError::InvalidCommand(format!(
                    "\"{KEY_DO}\" must be a non-empty string"
                )))
            }
            None => {
                return Err(SessionError::InvalidCommand(format!(
                    "missing \"{KEY_DO}\" key"
                )))
            }
        };
        Ok(Self { verb, params })
    }

    /// The command verb.
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Parameters, excluding the verb.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// `CANCEL` and `QUIT` may be sent while another operation is running.
    pub fn is_control(&self) -> bool {
        self.verb == VERB_CANCEL || self.verb == VERB_QUIT
    }

    /// Compact single-line JSON encoding.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.params.len() + 1))?;
        map.serialize_entry(KEY_DO, &self.verb)?;
        for (key, value) in &self.params {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
