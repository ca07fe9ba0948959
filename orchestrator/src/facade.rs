//! The public entry point: turns a list of generic requests into a list of
//! generic responses by driving a [crate::manager::BatchManager], with a
//! local result cache so re-running the same job against the same working
//! directory is free.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use batch_provider_client::config::OpenAIConfig;

use crate::config::OrchestratorConfig;
use crate::cost::{CostOracle, TableCostOracle};
use crate::error::Result;
use crate::files::request_file_name;
use crate::manager::BatchManager;
use crate::provider::{OpenAIBatchClient, ProviderClient};
use crate::rate_limits::{RateLimitOracle, TableRateLimitOracle};
use crate::request::GenericRequest;
use crate::response::GenericResponse;

fn cache_path(working_dir: &Path, parse_func_hash: &str) -> PathBuf {
    working_dir.join(format!("cache_{parse_func_hash}.jsonl"))
}

pub struct Orchestrator {
    provider: Arc<dyn ProviderClient>,
    api_key: String,
    config: OrchestratorConfig,
    cost_oracle: Arc<dyn CostOracle>,
    rate_limit_oracle: Arc<dyn RateLimitOracle>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ProviderClient>, api_key: impl Into<String>, config: OrchestratorConfig) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            config,
            cost_oracle: Arc::new(TableCostOracle),
            rate_limit_oracle: Arc::new(TableRateLimitOracle),
        }
    }

    /// Builds an [Orchestrator] backed by the real OpenAI-compatible Batch
    /// API, deriving the client's `api_base` from `config.url` (the
    /// `/v1/chat/completions` suffix is stripped off since the client talks
    /// to `/v1/files` and `/v1/batches`, not the completions endpoint
    /// directly).
    pub fn with_openai(api_key: impl Into<String>, config: OrchestratorConfig) -> Self {
        let api_key = api_key.into();
        let api_base = config
            .url
            .strip_suffix("/chat/completions")
            .unwrap_or(&config.url)
            .to_string();
        let client = batch_provider_client::Client::with_config(
            OpenAIConfig::new().with_api_key(api_key.clone()).with_api_base(api_base),
        );
        let provider: Arc<dyn ProviderClient> = Arc::new(OpenAIBatchClient::new(client));
        Self::new(provider, api_key, config)
    }

    pub fn with_cost_oracle(mut self, oracle: Arc<dyn CostOracle>) -> Self {
        self.cost_oracle = oracle;
        self
    }

    pub fn with_rate_limit_oracle(mut self, oracle: Arc<dyn RateLimitOracle>) -> Self {
        self.rate_limit_oracle = oracle;
        self
    }

    pub fn max_tokens_per_day(&self) -> u64 {
        self.rate_limit_oracle.max_tokens_per_day(&self.config.model)
    }

    /// Runs `requests` to completion in `working_dir`, keyed by
    /// `parse_func_hash` -- a caller-supplied fingerprint of however it plans
    /// to interpret the responses, so that changing only the downstream
    /// parsing logic does not force a re-submission of already-answered
    /// requests.
    pub async fn run(
        &self,
        requests: Vec<GenericRequest>,
        working_dir: impl Into<PathBuf>,
        parse_func_hash: &str,
    ) -> Result<Vec<GenericResponse>> {
        let working_dir = working_dir.into();
        tokio::fs::create_dir_all(&working_dir).await?;

        let cache = cache_path(&working_dir, parse_func_hash);
        if let Some(cached) = self.read_cache(&cache).await? {
            return Ok(cached);
        }

        let request_files = self.write_request_files(&requests, &working_dir).await?;

        let manager = BatchManager::new(
            self.provider.clone(),
            &working_dir,
            &self.api_key,
            self.config.clone(),
            self.cost_oracle.clone(),
        )?;
        let response_files = manager.run(request_files).await?;

        let mut responses = Vec::new();
        for path in &response_files {
            responses.extend(self.read_responses(path).await?);
        }
        responses.sort_by_key(|r| r.generic_request.original_row_idx);

        self.write_cache(&cache, &responses).await?;
        Ok(responses)
    }

    /// Cancels every in-flight batch recorded for this account in
    /// `working_dir` and retires its submitted journal. Per the orchestrator's
    /// cancellation contract, a caller driving this from a CLI should treat
    /// any non-zero return as grounds to exit with status 1.
    pub async fn cancel(&self, working_dir: impl Into<PathBuf>) -> Result<usize> {
        let working_dir = working_dir.into();
        let manager = BatchManager::new(
            self.provider.clone(),
            &working_dir,
            &self.api_key,
            self.config.clone(),
            self.cost_oracle.clone(),
        )?;
        manager.cancel().await
    }

    async fn write_request_files(
        &self,
        requests: &[GenericRequest],
        working_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for (index, chunk) in requests.chunks(self.config.batch_size).enumerate() {
            let path = working_dir.join(request_file_name(index));
            if !tokio::fs::try_exists(&path).await? {
                let mut out = Vec::new();
                for request in chunk {
                    serde_json::to_writer(&mut out, request)?;
                    out.push(b'\n');
                }
                tokio::fs::write(&path, out).await?;
            }
            files.push(path);
        }
        Ok(files)
    }

    async fn read_responses(&self, path: &Path) -> Result<Vec<GenericResponse>> {
        let contents = tokio::fs::read_to_string(path).await?;
        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| Ok(serde_json::from_str(l)?))
            .collect()
    }

    async fn read_cache(&self, path: &Path) -> Result<Option<Vec<GenericResponse>>> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(None);
        }
        Ok(Some(self.read_responses(path).await?))
    }

    async fn write_cache(&self, path: &Path, responses: &[GenericResponse]) -> Result<()> {
        let mut out = Vec::new();
        for response in responses {
            serde_json::to_writer(&mut out, response)?;
            out.push(b'\n');
        }
        tokio::fs::write(path, out).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ChatMessage;
    use async_trait::async_trait;
    use batch_provider_client::types::Batch;
    use bytes::Bytes;
    use std::collections::HashMap;

    struct NoopProvider;

    #[async_trait]
    impl ProviderClient for NoopProvider {
        async fn upload_batch_file(&self, _filename: &str, _bytes: Bytes) -> Result<String> {
            unreachable!("cache hit should short-circuit before any provider call")
        }
        async fn create_batch(&self, _input_file_id: &str, _metadata: HashMap<String, serde_json::Value>) -> Result<Batch> {
            unreachable!()
        }
        async fn retrieve_batch(&self, _batch_id: &str) -> Result<Batch> {
            unreachable!()
        }
        async fn cancel_batch(&self, _batch_id: &str) -> Result<Batch> {
            unreachable!()
        }
        async fn download_file(&self, _file_id: &str) -> Result<Bytes> {
            unreachable!()
        }
        async fn delete_file(&self, _file_id: &str) -> Result<()> {
            unreachable!()
        }
        fn account_suffix(&self) -> String {
            "test".to_string()
        }
    }

    #[tokio::test]
    async fn cache_hit_never_touches_the_provider() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(Arc::new(NoopProvider), "sk-testKEY1", OrchestratorConfig::default());

        let cached = GenericResponse {
            generic_request: GenericRequest::new(0, "gpt-4o-mini", vec![ChatMessage::new("user", "hi")]),
            response_message: Some(serde_json::json!("hello")),
            response_errors: Vec::new(),
            raw_request: None,
            raw_response: serde_json::json!({}),
            created_at: 0,
            finished_at: 0,
            token_usage: None,
            response_cost: None,
        };
        orchestrator
            .write_cache(&cache_path(dir.path(), "hash1"), &[cached.clone()])
            .await
            .unwrap();

        let result = orchestrator
            .run(
                vec![GenericRequest::new(0, "gpt-4o-mini", vec![ChatMessage::new("user", "hi")])],
                dir.path(),
                "hash1",
            )
            .await
            .unwrap();

        assert_eq!(result, vec![cached]);
    }

    #[test]
    fn max_tokens_per_day_defers_to_configured_model() {
        let orchestrator = Orchestrator::new(Arc::new(NoopProvider), "sk-test", OrchestratorConfig::default());
        assert_eq!(orchestrator.max_tokens_per_day(), TableRateLimitOracle.max_tokens_per_day("gpt-4o-mini"));
    }
}
