//! Error taxonomy for the orchestrator.
//!
//! Configuration and consistency errors are fatal before or after the fact;
//! provider errors are expected to be retried by the next poll cycle and are
//! surfaced here only so the caller can log them.

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Batch-size or size-limit violation, or a missing credential. Fatal before
    /// any I/O is attempted.
    #[error("configuration error: {0}")]
    Config(String),

    /// A remote call to the provider failed. The caller's next poll cycle
    /// re-examines the affected batch; this variant is never treated as fatal
    /// by the manager itself.
    #[error("provider error: {0}")]
    Provider(#[from] batch_provider_client::error::OpenAIError),

    /// Resume detected a downloaded-journal entry whose response file is
    /// missing from disk. Fatal: the working directory is in an inconsistent
    /// state and must not be trusted.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Polling finished with no batch in the downloaded set.
    #[error("fatal orchestration error: no batches were downloaded")]
    NothingDownloaded,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
