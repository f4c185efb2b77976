use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::apis::default_stream;

/// Body of `POST /query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
    /// Passed through to client construction as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

/// Buffered answer of `POST /query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    pub messages: Vec<String>,
}
