//! Thin seam between the manager and the remote Batch API.
//!
//! The manager only ever talks to this trait, never to
//! [batch_provider_client::Client] directly -- that is what lets properties
//! like resume idempotence, limit enforcement, and disjointness be exercised
//! with a fake that records calls instead of making them.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use batch_provider_client::config::Config;
use batch_provider_client::types::{
    Batch, BatchCompletionWindow, BatchEndpoint, BatchRequest, CreateFileRequestArgs, FileInput,
    FilePurpose,
};
use bytes::Bytes;

use crate::error::Result;
use crate::files::credential_suffix;

#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Uploads `bytes` as a batch-purpose file named `filename` and waits
    /// until it has left the `uploaded` state, returning its file id.
    async fn upload_batch_file(&self, filename: &str, bytes: Bytes) -> Result<String>;

    /// Creates a batch against `/v1/chat/completions` from an already
    /// uploaded input file, tagging it with `metadata`.
    async fn create_batch(
        &self,
        input_file_id: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<Batch>;

    async fn retrieve_batch(&self, batch_id: &str) -> Result<Batch>;

    async fn cancel_batch(&self, batch_id: &str) -> Result<Batch>;

    async fn download_file(&self, file_id: &str) -> Result<Bytes>;

    async fn delete_file(&self, file_id: &str) -> Result<()>;

    /// The last 4 characters of the underlying credential, used to namespace
    /// journal files in a working directory shared across accounts.
    fn account_suffix(&self) -> String;
}

pub struct OpenAIBatchClient<C: Config> {
    client: batch_provider_client::Client<C>,
}

impl<C: Config> OpenAIBatchClient<C> {
    pub fn new(client: batch_provider_client::Client<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: Config + Send + Sync> ProviderClient for OpenAIBatchClient<C> {
    async fn upload_batch_file(&self, filename: &str, bytes: Bytes) -> Result<String> {
        let request = CreateFileRequestArgs::default()
            .file(FileInput::new(filename, bytes))
            .purpose(FilePurpose::Batch)
            .build()?;
        let file = self.client.files().create(request).await?;

        // One-second initial grace period, then poll until the file has left
        // the `uploaded` state.
        tokio::time::sleep(Duration::from_secs(1)).await;
        let mut current = file;
        while current.status.as_deref() == Some("uploaded") {
            tokio::time::sleep(Duration::from_millis(500)).await;
            current = self.client.files().retrieve(&current.id).await?;
        }
        Ok(current.id)
    }

    async fn create_batch(
        &self,
        input_file_id: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<Batch> {
        let request = BatchRequest {
            input_file_id: input_file_id.to_string(),
            endpoint: BatchEndpoint::V1ChatCompletions,
            completion_window: BatchCompletionWindow::W24H,
            metadata: Some(metadata),
        };
        Ok(self.client.batches().create(request).await?)
    }

    async fn retrieve_batch(&self, batch_id: &str) -> Result<Batch> {
        Ok(self.client.batches().retrieve(batch_id).await?)
    }

    async fn cancel_batch(&self, batch_id: &str) -> Result<Batch> {
        Ok(self.client.batches().cancel(batch_id).await?)
    }

    async fn download_file(&self, file_id: &str) -> Result<Bytes> {
        Ok(self.client.files().content(file_id).await?)
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.client.files().delete(file_id).await?;
        Ok(())
    }

    fn account_suffix(&self) -> String {
        credential_suffix(self.client.config().api_key())
    }
}
