use reqwest::Body;

use crate::error::OpenAIError;
use crate::types::FileInput;

/// Creates the multipart part for the given in-memory JSONL payload.
pub(crate) fn create_file_part(file: FileInput) -> Result<reqwest::multipart::Part, OpenAIError> {
    let part = reqwest::multipart::Part::stream(Body::from(file.bytes))
        .file_name(file.filename)
        .mime_str("application/jsonl")
        .map_err(|e| OpenAIError::InvalidArgument(e.to_string()))?;
    Ok(part)
}
