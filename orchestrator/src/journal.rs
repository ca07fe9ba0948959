//! Append-only on-disk logs of submitted and downloaded batch descriptors.
//!
//! Journals are suffixed with the last 4 characters of the provider
//! credential so that multiple accounts can share one working directory
//! without clobbering each other's resume state.

use std::path::{Path, PathBuf};

use batch_provider_client::types::Batch;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::files::credential_suffix;

fn submitted_journal_path(working_dir: &Path, suffix: &str) -> PathBuf {
    working_dir.join(format!("batch_objects_submitted_{suffix}.jsonl"))
}

fn downloaded_journal_path(working_dir: &Path, suffix: &str) -> PathBuf {
    working_dir.join(format!("batch_objects_downloaded_{suffix}.jsonl"))
}

pub struct Journal {
    working_dir: PathBuf,
    suffix: String,
    submitted_lock: Mutex<()>,
    downloaded_lock: Mutex<()>,
}

impl Journal {
    pub fn new(working_dir: impl Into<PathBuf>, api_key: &str) -> Self {
        Self {
            working_dir: working_dir.into(),
            suffix: credential_suffix(api_key),
            submitted_lock: Mutex::new(()),
            downloaded_lock: Mutex::new(()),
        }
    }

    pub fn submitted_path(&self) -> PathBuf {
        submitted_journal_path(&self.working_dir, &self.suffix)
    }

    pub fn downloaded_path(&self) -> PathBuf {
        downloaded_journal_path(&self.working_dir, &self.suffix)
    }

    pub async fn append_submitted(&self, batch: &Batch) -> Result<()> {
        let _guard = self.submitted_lock.lock().await;
        append_line(&self.submitted_path(), batch).await
    }

    pub async fn append_downloaded(&self, batch: &Batch) -> Result<()> {
        let _guard = self.downloaded_lock.lock().await;
        append_line(&self.downloaded_path(), batch).await
    }

    /// Reads this account's own submitted journal, used during the resume
    /// scan to re-retrieve batches whose status may have advanced.
    pub async fn read_submitted(&self) -> Result<Vec<Batch>> {
        read_lines(&self.submitted_path()).await
    }

    /// Reads every `batch_objects_downloaded_*.jsonl` file in the working
    /// directory, across all accounts, since resume-correctness (§4.6.4) is
    /// defined in terms of "some downloaded journal in the working directory".
    pub async fn read_all_downloaded(&self) -> Result<Vec<Batch>> {
        let mut out = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.working_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("batch_objects_downloaded_") && name.ends_with(".jsonl") {
                out.extend(read_lines(&entry.path()).await?);
            }
        }
        Ok(out)
    }

    /// Renames the submitted journal with a `.cancelled` suffix, preserving
    /// history while removing it from the resume path.
    pub async fn mark_cancelled(&self) -> Result<()> {
        let _guard = self.submitted_lock.lock().await;
        let from = self.submitted_path();
        if tokio::fs::try_exists(&from).await? {
            let to = from.with_extension("jsonl.cancelled");
            tokio::fs::rename(&from, &to).await?;
        }
        Ok(())
    }
}

async fn append_line(path: &Path, batch: &Batch) -> Result<()> {
    let mut line = serde_json::to_vec(batch)?;
    line.push(b'\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}

async fn read_lines(path: &Path) -> Result<Vec<Batch>> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(Vec::new());
    }
    let content = tokio::fs::read_to_string(path).await?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| Ok(serde_json::from_str(l)?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch_provider_client::types::BatchStatus;

    fn batch(id: &str) -> Batch {
        Batch {
            id: id.to_string(),
            object: "batch".to_string(),
            endpoint: "/v1/chat/completions".to_string(),
            errors: None,
            input_file_id: "file-in".to_string(),
            completion_window: "24h".to_string(),
            status: BatchStatus::Completed,
            output_file_id: None,
            error_file_id: None,
            created_at: 0,
            in_progress_at: None,
            expires_at: None,
            finalizing_at: None,
            completed_at: None,
            failed_at: None,
            expired_at: None,
            cancelling_at: None,
            cancelled_at: None,
            request_counts: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn append_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path(), "sk-testWXYZ");
        journal.append_submitted(&batch("batch_a")).await.unwrap();
        journal.append_submitted(&batch("batch_b")).await.unwrap();

        let lines = journal.read_submitted().await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].id, "batch_a");
        assert_eq!(lines[1].id, "batch_b");
    }

    #[tokio::test]
    async fn cancel_renames_submitted_journal() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path(), "sk-testWXYZ");
        journal.append_submitted(&batch("batch_a")).await.unwrap();

        journal.mark_cancelled().await.unwrap();

        assert!(!tokio::fs::try_exists(journal.submitted_path())
            .await
            .unwrap());
        assert!(tokio::fs::try_exists(dir.path().join("batch_objects_submitted_WXYZ.jsonl.cancelled"))
            .await
            .unwrap());
    }
}
