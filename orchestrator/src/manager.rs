//! Drives a working directory of request files through upload, submission,
//! polling, and download, resuming from whatever journal state is already on
//! disk when it starts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use batch_provider_client::types::{Batch, BatchRequestOutput, BatchStatus};
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore};

use crate::config::OrchestratorConfig;
use crate::cost::CostOracle;
use crate::error::{OrchestratorError, Result};
use crate::files::{credential_suffix, response_path_for};
use crate::journal::Journal;
use crate::limits::validate_batch_body;
use crate::provider::ProviderClient;
use crate::request::GenericRequest;
use crate::response::GenericResponse;
use crate::tracker::{Progress, StatusTracker};
use crate::transformer::{
    build_request_index, DefaultResponseFormatParser, RequestTransformer, ResponseFormatParser,
    ResponseTransformer,
};

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn in_progress(status: &BatchStatus) -> bool {
    !matches!(
        status,
        BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Expired | BatchStatus::Cancelled
    )
}

/// The metadata key a batch carries so a restarted process can recover which
/// request file it came from without re-reading the upload.
const REQUEST_FILE_METADATA_KEY: &str = "request_file_name";

pub struct BatchManager {
    provider: Arc<dyn ProviderClient>,
    journal: Journal,
    working_dir: PathBuf,
    config: OrchestratorConfig,
    cost_oracle: Arc<dyn CostOracle>,
    response_parser: Arc<dyn ResponseFormatParser>,
    semaphore: Arc<Semaphore>,
    tracker: Mutex<StatusTracker>,
}

impl BatchManager {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        working_dir: impl Into<PathBuf>,
        api_key: &str,
        config: OrchestratorConfig,
        cost_oracle: Arc<dyn CostOracle>,
    ) -> Result<Self> {
        config.validate()?;
        let working_dir = working_dir.into();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency));
        Ok(Self {
            provider,
            journal: Journal::new(&working_dir, api_key),
            working_dir,
            config,
            cost_oracle,
            response_parser: Arc::new(DefaultResponseFormatParser),
            semaphore,
            tracker: Mutex::new(StatusTracker::default()),
        })
    }

    pub async fn progress(&self) -> Progress {
        self.tracker.lock().await.progress()
    }

    /// Runs the request files in `working_dir` to completion: resumes any
    /// journaled state, submits whatever remains unsubmitted, then polls
    /// until every submitted batch has been downloaded. Returns the set of
    /// response file paths written.
    pub async fn run(&self, request_files: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
        self.seed_tracker(request_files).await?;
        self.resume_from_downloaded().await?;
        self.resume_from_submitted().await?;
        self.submit_remaining().await?;
        self.poll_until_drained().await
    }

    async fn seed_tracker(&self, request_files: Vec<PathBuf>) -> Result<()> {
        let mut tracker = self.tracker.lock().await;
        *tracker = StatusTracker::new(request_files);
        Ok(())
    }

    /// Resume-correctness (§4.6.4 in spirit): a request file already has a
    /// downloaded batch recorded for it if and only if a response file also
    /// exists on disk at its paired path. Any other combination means the
    /// working directory was tampered with, or a crash left a half-written
    /// response file, and resuming would silently drop or duplicate data.
    async fn resume_from_downloaded(&self) -> Result<()> {
        let downloaded = self.journal.read_all_downloaded().await?;
        let mut tracker = self.tracker.lock().await;

        for batch in &downloaded {
            let Some(request_file) = self.request_file_of(batch) else {
                continue;
            };
            let response_exists = response_path_for(&self.working_dir, &request_file)
                .map(|p| p.exists())
                .unwrap_or(false);
            if !response_exists {
                return Err(OrchestratorError::Consistency(format!(
                    "batch {} is recorded as downloaded but its response file is missing",
                    batch.id
                )));
            }
            if tracker.is_unsubmitted(&request_file) {
                tracker.mark_as_submitted(&request_file, batch);
            }
            tracker.mark_as_finished(batch);
            tracker.mark_as_downloaded(batch);
        }
        Ok(())
    }

    /// Batches in our own submitted journal that never made it to the
    /// downloaded journal before the last crash: re-retrieve their current
    /// status so the poll loop starts from where the provider actually is.
    async fn resume_from_submitted(&self) -> Result<()> {
        let submitted = self.journal.read_submitted().await?;
        for stale in submitted {
            if self.tracker.lock().await.is_downloaded(&stale.id) {
                continue;
            }
            let Some(request_file) = self.request_file_of(&stale) else {
                continue;
            };
            let current = self.provider.retrieve_batch(&stale.id).await?;
            let mut tracker = self.tracker.lock().await;
            if tracker.is_unsubmitted(&request_file) {
                tracker.mark_as_submitted(&request_file, &current);
            }
            if !in_progress(&current.status) {
                tracker.mark_as_finished(&current);
            }
        }
        Ok(())
    }

    fn request_file_of(&self, batch: &Batch) -> Option<PathBuf> {
        let name = batch.metadata.as_ref()?.get(REQUEST_FILE_METADATA_KEY)?;
        Some(self.working_dir.join(name))
    }

    /// Concurrently transforms, validates, uploads, and creates a batch for
    /// every request file still in the unsubmitted set.
    async fn submit_remaining(&self) -> Result<()> {
        let remaining: Vec<PathBuf> = self
            .tracker
            .lock()
            .await
            .unsubmitted_request_files()
            .cloned()
            .collect();

        let mut tasks = FuturesUnordered::new();
        for file in remaining {
            let permit = self.semaphore.clone();
            tasks.push(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                let result = self.submit_one(&file).await;
                (file, result)
            });
        }

        while let Some((file, result)) = tasks.next().await {
            match result {
                Ok(batch) => {
                    self.tracker.lock().await.mark_as_submitted(&file, &batch);
                }
                Err(e) => {
                    tracing::error!(file = %file.display(), error = %e, "failed to submit request file");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn submit_one(&self, file: &Path) -> Result<Batch> {
        let contents = tokio::fs::read(file).await?;
        let requests: Vec<GenericRequest> = String::from_utf8_lossy(&contents)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| Ok(serde_json::from_str(l)?))
            .collect::<Result<_>>()?;

        let lines: Vec<Value> = requests
            .iter()
            .map(|r| {
                serde_json::to_value(RequestTransformer::transform(r, &self.config.generation_params))
                    .expect("batch request input always serializes")
            })
            .collect();

        let mut body = Vec::new();
        for line in &lines {
            serde_json::to_writer(&mut body, line)?;
            body.push(b'\n');
        }
        validate_batch_body(lines.len(), body.len())?;

        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| OrchestratorError::Config("request file has no valid name".to_string()))?;

        let file_id = self.provider.upload_batch_file(filename, Bytes::from(body)).await?;

        let mut metadata = HashMap::new();
        metadata.insert(
            REQUEST_FILE_METADATA_KEY.to_string(),
            Value::String(filename.to_string()),
        );
        let batch = self.provider.create_batch(&file_id, metadata).await?;
        self.journal.append_submitted(&batch).await?;
        Ok(batch)
    }

    /// Alternates retrieving every submitted batch and downloading every
    /// batch that has reached a terminal status, until nothing remains
    /// submitted.
    async fn poll_until_drained(&self) -> Result<Vec<PathBuf>> {
        let mut response_files = Vec::new();

        loop {
            let has_submitted = self.tracker.lock().await.has_submitted();
            if !has_submitted {
                break;
            }

            self.retrieve_submitted_once().await?;
            response_files.extend(self.download_finished_once().await?);

            let still_submitted = self.tracker.lock().await.has_submitted();
            if still_submitted {
                tokio::time::sleep(std::time::Duration::from_secs(self.config.check_interval)).await;
            }
        }

        let tracker = self.tracker.lock().await;
        let nothing_downloaded = tracker.downloaded_batches().next().is_none();
        let anything_submitted = tracker.progress().batches_submitted > 0;
        drop(tracker);
        if nothing_downloaded && anything_submitted {
            return Err(OrchestratorError::NothingDownloaded);
        }
        Ok(response_files)
    }

    async fn retrieve_submitted_once(&self) -> Result<()> {
        let ids: Vec<String> = self
            .tracker
            .lock()
            .await
            .submitted_batches()
            .cloned()
            .collect();

        let mut tasks = FuturesUnordered::new();
        for id in ids {
            tasks.push(async move { self.provider.retrieve_batch(&id).await });
        }

        while let Some(result) = tasks.next().await {
            let batch = result?;
            tracing::debug!(batch_id = %batch.id, status = ?batch.status, "retrieved batch status");
            if !in_progress(&batch.status) {
                self.tracker.lock().await.mark_as_finished(&batch);
            }
        }
        Ok(())
    }

    /// Downloads every batch that has reached a terminal status and has not
    /// yet been downloaded, applying the per-status download policy (§4.6.3
    /// in spirit): `completed` downloads the output file, `failed` downloads
    /// the error file if one exists, and `cancelled`/`expired` write nothing.
    async fn download_finished_once(&self) -> Result<Vec<PathBuf>> {
        let to_download = self.finished_batch_ids().await;

        let mut tasks = FuturesUnordered::new();
        for batch_id in to_download {
            let permit = self.semaphore.clone();
            tasks.push(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                let batch = self.provider.retrieve_batch(&batch_id).await?;
                let path = self.download_one(&batch).await?;
                Ok::<_, OrchestratorError>((batch, path))
            });
        }

        let mut written = Vec::new();
        while let Some(result) = tasks.next().await {
            let (batch, path) = result?;
            if let Some(path) = path {
                written.push(path);
            }
            self.tracker.lock().await.mark_as_downloaded(&batch);
        }
        Ok(written)
    }

    async fn finished_batch_ids(&self) -> Vec<String> {
        self.tracker.lock().await.finished_batches().cloned().collect()
    }

    async fn download_one(&self, batch: &Batch) -> Result<Option<PathBuf>> {
        let Some(request_file) = self.request_file_of(batch) else {
            tracing::error!(batch_id = %batch.id, "finished batch has no recoverable request file, skipping download");
            return Ok(None);
        };
        let Some(response_path) = response_path_for(&self.working_dir, &request_file) else {
            return Ok(None);
        };

        let lines = match batch.status {
            BatchStatus::Completed => match &batch.output_file_id {
                Some(id) => self.download_lines(id).await?,
                None => {
                    tracing::warn!(batch_id = %batch.id, "completed batch has no output file");
                    Vec::new()
                }
            },
            BatchStatus::Failed => match &batch.error_file_id {
                Some(id) => self.download_lines(id).await?,
                None => {
                    if let Some(errors) = &batch.errors {
                        for e in &errors.data {
                            tracing::error!(batch_id = %batch.id, code = %e.code, message = %e.message, "batch failed with no error file");
                        }
                    }
                    Vec::new()
                }
            },
            BatchStatus::Cancelled | BatchStatus::Expired => {
                tracing::warn!(batch_id = %batch.id, status = ?batch.status, "batch ended without producing results");
                Vec::new()
            }
            _ => Vec::new(),
        };

        if lines.is_empty() {
            self.journal.append_downloaded(batch).await?;
            self.maybe_delete_batch_files(batch).await;
            return Ok(None);
        }

        let requests = self.read_requests(&request_file).await?;
        let index = build_request_index(&requests);
        let finished_at = now_unix();

        let mut out = Vec::new();
        for line in &lines {
            if let Some(response) = ResponseTransformer::transform(
                line,
                &index,
                batch,
                finished_at,
                self.cost_oracle.as_ref(),
                self.response_parser.as_ref(),
                self.config.batch_discount,
            ) {
                out.push(response);
            }
        }
        self.write_responses(&response_path, &out).await?;
        self.journal.append_downloaded(batch).await?;
        self.maybe_delete_batch_files(batch).await;

        Ok(Some(response_path))
    }

    /// Applies the deletion policy of §4.6.3/§3's Ownership clause: the choice
    /// between `delete_successful_batch_files` and `delete_failed_batch_files`
    /// follows the batch's own terminal status, never a property of the
    /// transformed output rows, and each branch only ever deletes the files
    /// that branch actually owns (a `completed` batch never touches an error
    /// file it doesn't have; a `failed`/`cancelled`/`expired` batch never
    /// touches an output file it never produced).
    async fn maybe_delete_batch_files(&self, batch: &Batch) {
        let (should_delete, file_ids): (bool, Vec<&str>) = match batch.status {
            BatchStatus::Completed => (
                self.config.delete_successful_batch_files,
                std::iter::once(batch.input_file_id.as_str())
                    .chain(batch.output_file_id.as_deref())
                    .collect(),
            ),
            BatchStatus::Failed => (
                self.config.delete_failed_batch_files,
                std::iter::once(batch.input_file_id.as_str())
                    .chain(batch.error_file_id.as_deref())
                    .collect(),
            ),
            _ => (
                self.config.delete_failed_batch_files,
                vec![batch.input_file_id.as_str()],
            ),
        };
        if !should_delete {
            return;
        }
        for file_id in file_ids {
            if let Err(e) = self.provider.delete_file(file_id).await {
                tracing::warn!(file_id = %file_id, error = %e, "failed to delete batch file");
            }
        }
    }

    async fn download_lines(&self, file_id: &str) -> Result<Vec<BatchRequestOutput>> {
        let bytes = self.provider.download_file(file_id).await?;
        let text = String::from_utf8_lossy(&bytes);
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| Ok(serde_json::from_str(l)?))
            .collect()
    }

    async fn read_requests(&self, request_file: &Path) -> Result<Vec<GenericRequest>> {
        let contents = tokio::fs::read_to_string(request_file).await?;
        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| Ok(serde_json::from_str(l)?))
            .collect()
    }

    async fn write_responses(&self, path: &Path, responses: &[GenericResponse]) -> Result<()> {
        let mut out = Vec::new();
        for response in responses {
            serde_json::to_writer(&mut out, response)?;
            out.push(b'\n');
        }
        tokio::fs::write(path, out).await?;
        Ok(())
    }

    /// Cancels every non-`completed` batch recorded in this account's
    /// submitted journal and renames that journal so it is excluded from the
    /// next resume. Per §4.6.5, each batch is re-retrieved first so the
    /// decision to cancel is made on its current status, not the status last
    /// recorded at submission time. Returns the number of batches that could
    /// not be cancelled.
    pub async fn cancel(&self) -> Result<usize> {
        let submitted = self.journal.read_submitted().await?;
        let mut failures = 0usize;

        let mut tasks = FuturesUnordered::new();
        for batch in submitted {
            let permit = self.semaphore.clone();
            tasks.push(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                let current = self.provider.retrieve_batch(&batch.id).await?;
                if matches!(current.status, BatchStatus::Completed) {
                    return Ok(());
                }
                self.provider.cancel_batch(&batch.id).await.map(|_| ())
            });
        }

        while let Some(result) = tasks.next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "failed to cancel batch");
                failures += 1;
            }
        }

        self.journal.mark_cancelled().await?;
        Ok(failures)
    }

    pub fn account_suffix(&self) -> String {
        self.provider.account_suffix()
    }
}

/// Re-derives the suffix used to namespace a working directory's journals
/// from the provider's own credential, for callers that need it before a
/// [BatchManager] exists (e.g. the façade's result cache).
pub fn suffix_for(api_key: &str) -> String {
    credential_suffix(api_key)
}
