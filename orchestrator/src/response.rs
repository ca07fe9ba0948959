use serde::{Deserialize, Serialize};

use crate::request::GenericRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Produced 1:1 per [GenericRequest] upon download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericResponse {
    pub generic_request: GenericRequest,

    /// The parsed structured object when a response format was supplied,
    /// otherwise the raw model text. Absent on failure.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_message: Option<serde_json::Value>,

    /// Non-empty if and only if this record is a failure.
    #[serde(default)]
    pub response_errors: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub raw_request: Option<serde_json::Value>,

    pub raw_response: serde_json::Value,

    /// The batch's creation time.
    pub created_at: i64,
    /// The local clock at download time.
    pub finished_at: i64,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token_usage: Option<TokenUsage>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_cost: Option<f64>,
}

impl GenericResponse {
    pub fn is_failure(&self) -> bool {
        !self.response_errors.is_empty()
    }
}
