// ABOUTME: Event type emitted by a deployed agent while answering a query.
// ABOUTME: Payload is kept opaque; helpers read the text parts when present.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of streamed response data from a remote agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct QueryEvent {
    payload: Value,
}

impl QueryEvent {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Build an event carrying a single model text part
    pub fn from_text(text: &str) -> Self {
        Self::new(serde_json::json!({
            "content": {
                "role": "model",
                "parts": [{ "text": text }]
            }
        }))
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Author of the event, if the remote runtime reported one
    pub fn author(&self) -> Option<&str> {
        self.payload.get("author").and_then(Value::as_str)
    }

    /// Concatenated `content.parts[].text`, empty when the event has no text
    pub fn text(&self) -> String {
        self.payload
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Display for QueryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.payload)
    }
}
