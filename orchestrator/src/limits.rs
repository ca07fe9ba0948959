//! Provider hard limits, enforced before any upload.

use crate::error::{OrchestratorError, Result};

/// At most this many requests may appear in a single uploaded batch file.
pub const MAX_REQUESTS_PER_BATCH: usize = 50_000;

/// At most this many bytes of serialized body may be uploaded in a single
/// batch file.
pub const MAX_BATCH_BYTES: usize = 200 * 1024 * 1024;

/// Validates a fully-serialized batch file before it is ever uploaded.
pub fn validate_batch_body(line_count: usize, body_bytes: usize) -> Result<()> {
    if line_count > MAX_REQUESTS_PER_BATCH {
        return Err(OrchestratorError::Config(format!(
            "batch file has {line_count} requests, exceeding the limit of {MAX_REQUESTS_PER_BATCH}"
        )));
    }
    if body_bytes > MAX_BATCH_BYTES {
        return Err(OrchestratorError::Config(format!(
            "batch file is {body_bytes} bytes, exceeding the limit of {MAX_BATCH_BYTES} bytes"
        )));
    }
    Ok(())
}
