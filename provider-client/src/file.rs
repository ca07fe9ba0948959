use bytes::Bytes;

use crate::{
    config::Config,
    error::OpenAIError,
    types::{CreateFileRequest, DeleteFileResponse, OpenAIFile},
    util::create_file_part,
    Client, RequestOptions,
};

/// Files are used to upload the JSONL documents consumed by the Batch API.
pub struct Files<'c, C: Config> {
    client: &'c Client<C>,
    pub(crate) request_options: RequestOptions,
}

impl<'c, C: Config> Files<'c, C> {
    pub fn new(client: &'c Client<C>) -> Self {
        Self {
            client,
            request_options: RequestOptions::new(),
        }
    }

    /// Upload a file that can be referenced from a batch. The Batch API only accepts
    /// `.jsonl` files up to 200 MB in size.
    pub async fn create(&self, request: CreateFileRequest) -> Result<OpenAIFile, OpenAIError> {
        let file_part = create_file_part(request.file)?;
        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("purpose", request.purpose.to_string());

        self.client
            .post_form("/files", form, &self.request_options)
            .await
    }

    /// Returns information about a specific file. Used to wait for a just-uploaded
    /// file to leave the `uploaded` state before it is referenced by a batch.
    pub async fn retrieve(&self, file_id: &str) -> Result<OpenAIFile, OpenAIError> {
        self.client
            .get(&format!("/files/{file_id}"), &self.request_options)
            .await
    }

    /// Delete a file.
    pub async fn delete(&self, file_id: &str) -> Result<DeleteFileResponse, OpenAIError> {
        self.client
            .delete(&format!("/files/{file_id}"), &self.request_options)
            .await
    }

    /// Returns the raw contents of the specified file (an output or error JSONL).
    pub async fn content(&self, file_id: &str) -> Result<Bytes, OpenAIError> {
        let (bytes, _headers) = self
            .client
            .get_raw(&format!("/files/{file_id}/content"), &self.request_options)
            .await?;
        Ok(bytes)
    }
}
