use std::collections::HashMap;

use batch_provider_client::types::{Batch, BatchRequestOutput};
use serde_json::Value;

use crate::cost::CostOracle;
use crate::request::GenericRequest;
use crate::response::{GenericResponse, TokenUsage};

/// Delegated validation of model output against the caller's response
/// format. The schema is opaque to the orchestrator: it is handed through
/// verbatim and never interpreted beyond "does this content satisfy it".
pub trait ResponseFormatParser: Send + Sync {
    /// `schema` is `None` when the request carried no response format, in
    /// which case the content is always accepted as a raw string.
    fn parse(&self, content: &str, schema: Option<&Value>) -> Result<Value, Vec<String>>;
}

/// Validates `content` as JSON against `schema` with the `jsonschema` crate
/// when a schema is present; otherwise returns the content as a raw string.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResponseFormatParser;

impl ResponseFormatParser for DefaultResponseFormatParser {
    fn parse(&self, content: &str, schema: Option<&Value>) -> Result<Value, Vec<String>> {
        let Some(schema) = schema else {
            return Ok(Value::String(content.to_string()));
        };

        let parsed: Value = serde_json::from_str(content)
            .map_err(|e| vec![format!("model output is not valid JSON: {e}")])?;

        let validator = jsonschema::validator_for(schema)
            .map_err(|e| vec![format!("invalid response-format schema: {e}")])?;

        let errors: Vec<String> = validator
            .iter_errors(&parsed)
            .map(|e| format!("{e} (at {})", e.instance_path()))
            .collect();

        if errors.is_empty() {
            Ok(parsed)
        } else {
            Err(errors)
        }
    }
}

/// An index from `original_row_idx` back to the [GenericRequest] that
/// produced it, built once from a request file before its responses are
/// transformed.
pub type RequestIndex = HashMap<i64, GenericRequest>;

pub fn build_request_index(requests: &[GenericRequest]) -> RequestIndex {
    requests
        .iter()
        .map(|r| (r.original_row_idx, r.clone()))
        .collect()
}

pub struct ResponseTransformer;

impl ResponseTransformer {
    /// Converts a single downloaded provider line into a [GenericResponse].
    /// Returns `None`, logging the condition, if `custom_id` cannot be
    /// resolved back to a request in `index` -- that can only happen if the
    /// working directory has been tampered with, since the orchestrator
    /// itself always writes `custom_id` as `original_row_idx.to_string()`.
    pub fn transform(
        line: &BatchRequestOutput,
        index: &RequestIndex,
        batch: &Batch,
        finished_at: i64,
        cost_oracle: &dyn CostOracle,
        parser: &dyn ResponseFormatParser,
        batch_discount: f64,
    ) -> Option<GenericResponse> {
        let Ok(row_idx) = line.custom_id.parse::<i64>() else {
            tracing::error!(custom_id = %line.custom_id, "custom_id is not a valid row index");
            return None;
        };
        let Some(generic_request) = index.get(&row_idx) else {
            tracing::error!(row_idx, "no request found for downloaded custom_id");
            return None;
        };

        let raw_response = serde_json::to_value(line).unwrap_or(Value::Null);
        let created_at = batch.created_at as i64;

        if let Some(error) = &line.error {
            return Some(GenericResponse {
                generic_request: generic_request.clone(),
                response_message: None,
                response_errors: vec![format!("{}: {}", error.code, error.message)],
                raw_request: None,
                raw_response,
                created_at,
                finished_at,
                token_usage: None,
                response_cost: None,
            });
        }

        let Some(response) = &line.response else {
            return Some(GenericResponse {
                generic_request: generic_request.clone(),
                response_message: None,
                response_errors: vec!["response line carried neither a response nor an error".to_string()],
                raw_request: None,
                raw_response,
                created_at,
                finished_at,
                token_usage: None,
                response_cost: None,
            });
        };

        if response.status_code != 200 {
            return Some(GenericResponse {
                generic_request: generic_request.clone(),
                response_message: None,
                response_errors: vec![format!(
                    "request failed with HTTP status {}: {}",
                    response.status_code, response.body
                )],
                raw_request: None,
                raw_response,
                created_at,
                finished_at,
                token_usage: None,
                response_cost: None,
            });
        }

        let content = response.body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        let usage = &response.body["usage"];
        let token_usage = TokenUsage {
            prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
            total_tokens: usage["total_tokens"].as_u64().unwrap_or(0),
        };

        let unit_cost = cost_oracle.cost(&generic_request.model, &generic_request.messages, &content);
        let response_cost = batch_discount * unit_cost;

        match parser.parse(&content, generic_request.response_format.as_ref()) {
            Ok(message) => Some(GenericResponse {
                generic_request: generic_request.clone(),
                response_message: Some(message),
                response_errors: Vec::new(),
                raw_request: None,
                raw_response,
                created_at,
                finished_at,
                token_usage: Some(token_usage),
                response_cost: Some(response_cost),
            }),
            Err(errors) => Some(GenericResponse {
                generic_request: generic_request.clone(),
                response_message: None,
                response_errors: errors,
                raw_request: None,
                raw_response,
                created_at,
                finished_at,
                token_usage: Some(token_usage),
                response_cost: Some(response_cost),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::TableCostOracle;
    use crate::request::ChatMessage;
    use batch_provider_client::types::{BatchRequestOutputError, BatchRequestOutputResponse, BatchStatus};
    use serde_json::json;

    fn batch() -> Batch {
        Batch {
            id: "batch_1".to_string(),
            object: "batch".to_string(),
            endpoint: "/v1/chat/completions".to_string(),
            errors: None,
            input_file_id: "file-in".to_string(),
            completion_window: "24h".to_string(),
            status: BatchStatus::Completed,
            output_file_id: Some("file-out".to_string()),
            error_file_id: None,
            created_at: 1000,
            in_progress_at: None,
            expires_at: None,
            finalizing_at: None,
            completed_at: None,
            failed_at: None,
            expired_at: None,
            cancelling_at: None,
            cancelled_at: None,
            request_counts: None,
            metadata: None,
        }
    }

    #[test]
    fn applies_the_batch_discount_to_a_completed_record() {
        struct FixedOracle;
        impl CostOracle for FixedOracle {
            fn cost(&self, _model: &str, _prompt: &[ChatMessage], _completion: &str) -> f64 {
                0.002
            }
        }

        let request = GenericRequest::new(7, "gpt-4o-mini", vec![ChatMessage::new("user", "hi")]);
        let mut index = RequestIndex::new();
        index.insert(7, request);

        let line = BatchRequestOutput {
            id: "line-1".to_string(),
            custom_id: "7".to_string(),
            response: Some(BatchRequestOutputResponse {
                status_code: 200,
                request_id: "req-1".to_string(),
                body: json!({
                    "choices": [{"message": {"content": "A"}}],
                    "usage": {"prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150},
                }),
            }),
            error: None,
        };

        let response = ResponseTransformer::transform(
            &line,
            &index,
            &batch(),
            2000,
            &FixedOracle,
            &DefaultResponseFormatParser,
            0.5,
        )
        .unwrap();

        assert_eq!(response.response_cost.unwrap(), 0.001);
        assert_eq!(response.response_message, Some(json!("A")));
        assert!(response.response_errors.is_empty());
    }

    #[test]
    fn non_200_status_produces_a_failure_with_no_usage() {
        let request = GenericRequest::new(9, "gpt-4o-mini", vec![ChatMessage::new("user", "hi")]);
        let mut index = RequestIndex::new();
        index.insert(9, request);

        let line = BatchRequestOutput {
            id: "line-2".to_string(),
            custom_id: "9".to_string(),
            response: Some(BatchRequestOutputResponse {
                status_code: 429,
                request_id: "req-2".to_string(),
                body: json!({"error": "rate limited"}),
            }),
            error: None,
        };

        let response = ResponseTransformer::transform(
            &line,
            &index,
            &batch(),
            2000,
            &TableCostOracle,
            &DefaultResponseFormatParser,
            0.5,
        )
        .unwrap();

        assert!(response.is_failure());
        assert!(response.token_usage.is_none());
        assert!(response.response_message.is_none());
    }

    #[test]
    fn non_http_error_line_produces_a_failure() {
        let request = GenericRequest::new(3, "gpt-4o-mini", vec![ChatMessage::new("user", "hi")]);
        let mut index = RequestIndex::new();
        index.insert(3, request);

        let line = BatchRequestOutput {
            id: "line-3".to_string(),
            custom_id: "3".to_string(),
            response: None,
            error: Some(BatchRequestOutputError {
                code: "server_error".to_string(),
                message: "boom".to_string(),
            }),
        };

        let response = ResponseTransformer::transform(
            &line,
            &index,
            &batch(),
            2000,
            &TableCostOracle,
            &DefaultResponseFormatParser,
            0.5,
        )
        .unwrap();

        assert!(response.is_failure());
        assert_eq!(response.response_errors[0], "server_error: boom");
    }

    #[test]
    fn schema_mismatch_is_recorded_as_a_parse_error_not_a_panic() {
        let request = GenericRequest::new(5, "gpt-4o-mini", vec![ChatMessage::new("user", "hi")])
            .with_response_format(json!({
                "type": "object",
                "required": ["answer"],
                "properties": {"answer": {"type": "string"}},
            }));
        let mut index = RequestIndex::new();
        index.insert(5, request);

        let line = BatchRequestOutput {
            id: "line-4".to_string(),
            custom_id: "5".to_string(),
            response: Some(BatchRequestOutputResponse {
                status_code: 200,
                request_id: "req-4".to_string(),
                body: json!({
                    "choices": [{"message": {"content": "{\"wrong\": true}"}}],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
                }),
            }),
            error: None,
        };

        let response = ResponseTransformer::transform(
            &line,
            &index,
            &batch(),
            2000,
            &TableCostOracle,
            &DefaultResponseFormatParser,
            0.5,
        )
        .unwrap();

        assert!(response.is_failure());
        assert!(response.response_message.is_none());
        assert!(response.token_usage.is_some());
    }
}
