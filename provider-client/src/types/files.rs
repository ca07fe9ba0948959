use std::fmt::Display;

use bytes::Bytes;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::OpenAIError;

/// An in-memory JSONL payload to upload, named the way the API expects a multipart
/// file part to be named.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileInput {
    pub filename: String,
    pub bytes: Bytes,
}

impl FileInput {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilePurpose {
    #[default]
    Batch,
    FineTune,
}

impl Display for FilePurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Batch => "batch",
                Self::FineTune => "fine-tune",
            }
        )
    }
}

#[derive(Debug, Default, Clone, Builder, PartialEq)]
#[builder(name = "CreateFileRequestArgs")]
#[builder(pattern = "mutable")]
#[builder(setter(into, strip_option), default)]
#[builder(derive(Debug))]
#[builder(build_fn(error = "OpenAIError"))]
pub struct CreateFileRequest {
    /// The file contents to upload.
    pub file: FileInput,

    /// The intended purpose of the uploaded file; batch-file uploads always use `batch`.
    pub purpose: FilePurpose,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum OpenAIFilePurpose {
    #[serde(rename = "batch")]
    Batch,
    #[serde(rename = "batch_output")]
    BatchOutput,
    #[serde(rename = "fine-tune")]
    FineTune,
}

/// The `File` object represents a document that has been uploaded to the provider.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OpenAIFile {
    /// The file identifier, which can be referenced in other API endpoints.
    pub id: String,
    /// The object type, which is always "file".
    pub object: String,
    /// The size of the file in bytes.
    pub bytes: u64,
    /// The Unix timestamp (in seconds) for when the file was created.
    pub created_at: u64,
    /// The Unix timestamp (in seconds) for when the file will expire.
    pub expires_at: Option<u64>,
    /// The name of the file.
    pub filename: String,
    pub purpose: OpenAIFilePurpose,
    /// The current status of the file: `uploaded`, `processed`, or `error`.
    pub status: Option<String>,
    pub status_details: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct DeleteFileResponse {
    pub id: String,
    pub object: String,
    pub deleted: bool,
}
