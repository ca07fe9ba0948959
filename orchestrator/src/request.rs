use serde::{Deserialize, Serialize};

/// A single turn in the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// A provider-agnostic request record, immutable once written to a request file.
///
/// `original_row_idx` is stable and unique within a working directory; it is
/// echoed back as the provider's `custom_id` so a downloaded response can be
/// matched back to the request that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericRequest {
    pub original_row_idx: i64,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_format: Option<serde_json::Value>,
}

impl GenericRequest {
    pub fn new(original_row_idx: i64, model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            original_row_idx,
            model: model.into(),
            messages,
            response_format: None,
        }
    }

    pub fn with_response_format(mut self, schema: serde_json::Value) -> Self {
        self.response_format = Some(schema);
        self
    }
}
