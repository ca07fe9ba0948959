use crate::error::{OrchestratorError, Result};
use crate::limits::MAX_REQUESTS_PER_BATCH;

/// The default endpoint base the orchestrator targets when none is configured.
pub const DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Optional generation parameters. Unset fields are omitted from the request
/// body entirely rather than serialized as `null`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GenerationParams {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum requests per batch file. MUST be <= 50,000.
    pub batch_size: usize,
    /// Provider model identifier; governs cost-oracle and rate-limit lookups.
    pub model: String,
    /// Seconds between poll cycles.
    pub check_interval: u64,
    pub delete_successful_batch_files: bool,
    pub delete_failed_batch_files: bool,
    pub generation_params: GenerationParams,
    pub url: String,
    /// Upper bound on concurrent in-flight provider calls.
    pub max_concurrency: usize,
    /// Fraction of the non-batch unit cost a completed batch request is billed
    /// at. The provider's batch discount may not apply uniformly to every
    /// model, so this is a knob rather than a hardcoded constant.
    pub batch_discount: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_REQUESTS_PER_BATCH,
            model: "gpt-4o-mini".to_string(),
            check_interval: 60,
            delete_successful_batch_files: false,
            delete_failed_batch_files: false,
            generation_params: GenerationParams::default(),
            url: DEFAULT_URL.to_string(),
            max_concurrency: 100,
            batch_discount: 0.5,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_REQUESTS_PER_BATCH {
            return Err(OrchestratorError::Config(format!(
                "batch_size must be in 1..={MAX_REQUESTS_PER_BATCH}, got {}",
                self.batch_size
            )));
        }
        if self.max_concurrency == 0 {
            return Err(OrchestratorError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
