use batch_provider_client::types::{BatchEndpoint, BatchRequestInput, BatchRequestInputMethod};
use serde_json::{json, Map, Value};

use crate::config::GenerationParams;
use crate::request::GenericRequest;

/// Converts a [GenericRequest] into the single JSON object the provider
/// expects per line of an uploaded batch file.
pub struct RequestTransformer;

impl RequestTransformer {
    pub fn transform(
        request: &GenericRequest,
        params: &GenerationParams,
    ) -> BatchRequestInput {
        let mut body = Map::new();
        body.insert("model".to_string(), Value::String(request.model.clone()));
        body.insert(
            "messages".to_string(),
            serde_json::to_value(&request.messages).expect("messages always serialize"),
        );

        if let Some(schema) = &request.response_format {
            body.insert(
                "response_format".to_string(),
                json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": "output_schema",
                        "schema": schema,
                    },
                }),
            );
        }

        if let Some(t) = params.temperature {
            body.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = params.top_p {
            body.insert("top_p".to_string(), json!(t));
        }
        if let Some(t) = params.presence_penalty {
            body.insert("presence_penalty".to_string(), json!(t));
        }
        if let Some(t) = params.frequency_penalty {
            body.insert("frequency_penalty".to_string(), json!(t));
        }

        BatchRequestInput {
            custom_id: request.original_row_idx.to_string(),
            method: BatchRequestInputMethod::POST,
            url: BatchEndpoint::V1ChatCompletions,
            body: Value::Object(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ChatMessage;

    #[test]
    fn omits_unset_generation_params() {
        let req = GenericRequest::new(0, "gpt-4o-mini", vec![ChatMessage::new("user", "hi")]);
        let line = RequestTransformer::transform(&req, &GenerationParams::default());
        assert_eq!(line.custom_id, "0");
        assert!(line.body.get("temperature").is_none());
    }

    #[test]
    fn sets_generation_params_when_configured() {
        let req = GenericRequest::new(1, "gpt-4o-mini", vec![ChatMessage::new("user", "hi")]);
        let params = GenerationParams {
            temperature: Some(0.2),
            ..Default::default()
        };
        let line = RequestTransformer::transform(&req, &params);
        assert_eq!(line.body["temperature"], 0.2);
        assert!(line.body.get("top_p").is_none());
    }

    #[test]
    fn wraps_response_format_as_json_schema_envelope_without_strict() {
        let req = GenericRequest::new(2, "gpt-4o-mini", vec![ChatMessage::new("user", "hi")])
            .with_response_format(json!({"type": "object"}));
        let line = RequestTransformer::transform(&req, &GenerationParams::default());
        let rf = &line.body["response_format"];
        assert_eq!(rf["type"], "json_schema");
        assert_eq!(rf["json_schema"]["name"], "output_schema");
        assert!(rf.get("strict").is_none());
    }
}
