use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::ClientError;

/// One unit emitted by an agent while answering a prompt.
///
/// The gateway does not interpret messages; it only renders them as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Value);

impl Message {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse a single line of stream-json output
    pub fn parse_line(line: &str) -> Result<Self, ClientError> {
        serde_json::from_str(line)
            .map(Self)
            .map_err(|e| ClientError::Protocol(format!("{}: {}", e, line)))
    }

    /// The `type` field, if the message carries one
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// A `result` message closes the current turn
    pub fn is_result(&self) -> bool {
        self.kind() == Some("result")
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
