//! Pure in-memory bookkeeping of request files, batch IDs, and request counts
//! across the four lifecycle buckets. Holds no I/O; the manager is
//! responsible for calling these methods only after an await boundary has
//! resumed, so no two calls ever interleave.

use std::collections::HashSet;
use std::path::PathBuf;

use batch_provider_client::types::Batch;

/// A read-only snapshot of progress, derived from the tracker rather than
/// maintained independently. Any UI layer consumes the tracker only through
/// this projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub batches_submitted: u64,
    pub requests_finished: u64,
    pub requests_downloaded: u64,
    pub requests_total: u64,
}

#[derive(Debug, Default)]
pub struct StatusTracker {
    unsubmitted_request_files: HashSet<PathBuf>,
    submitted_batches: HashSet<String>,
    finished_batches: HashSet<String>,
    downloaded_batches: HashSet<String>,

    n_total_batches: u64,
    n_total_requests: u64,
    n_finished_requests: u64,
    n_downloaded_requests: u64,
}

fn request_counts(batch: &Batch) -> u64 {
    batch
        .request_counts
        .as_ref()
        .map(|c| u64::from(c.completed) + u64::from(c.failed))
        .unwrap_or(0)
}

impl StatusTracker {
    pub fn new(request_files: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            unsubmitted_request_files: request_files.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn unsubmitted_request_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.unsubmitted_request_files.iter()
    }

    pub fn is_unsubmitted(&self, file: &PathBuf) -> bool {
        self.unsubmitted_request_files.contains(file)
    }

    pub fn remove_unsubmitted(&mut self, file: &PathBuf) -> bool {
        self.unsubmitted_request_files.remove(file)
    }

    pub fn submitted_batches(&self) -> impl Iterator<Item = &String> {
        self.submitted_batches.iter()
    }

    pub fn has_submitted(&self) -> bool {
        !self.submitted_batches.is_empty()
    }

    pub fn finished_batches(&self) -> impl Iterator<Item = &String> {
        self.finished_batches.iter()
    }

    pub fn downloaded_batches(&self) -> impl Iterator<Item = &String> {
        self.downloaded_batches.iter()
    }

    pub fn is_downloaded(&self, batch_id: &str) -> bool {
        self.downloaded_batches.contains(batch_id)
    }

    /// Precondition: `file` is in the unsubmitted set.
    pub fn mark_as_submitted(&mut self, request_file: &PathBuf, batch: &Batch) {
        debug_assert!(
            self.unsubmitted_request_files.contains(request_file),
            "mark_as_submitted called on a file that was not unsubmitted"
        );
        self.unsubmitted_request_files.remove(request_file);
        self.submitted_batches.insert(batch.id.clone());
        self.n_total_batches += 1;
        self.n_total_requests += batch
            .request_counts
            .as_ref()
            .map(|c| u64::from(c.total))
            .unwrap_or(0);
        self.assert_disjoint();
    }

    /// Idempotent: a batch already finished or downloaded is left alone.
    pub fn mark_as_finished(&mut self, batch: &Batch) {
        if self.finished_batches.contains(&batch.id) || self.downloaded_batches.contains(&batch.id)
        {
            return;
        }
        if self.submitted_batches.remove(&batch.id) {
            self.finished_batches.insert(batch.id.clone());
            self.n_finished_requests += request_counts(batch);
        }
        self.assert_disjoint();
    }

    /// Idempotent: a batch not currently finished (already downloaded, or
    /// never seen) is left alone.
    pub fn mark_as_downloaded(&mut self, batch: &Batch) {
        if self.downloaded_batches.contains(&batch.id) {
            return;
        }
        if self.finished_batches.remove(&batch.id) {
            let n = request_counts(batch);
            self.n_finished_requests = self.n_finished_requests.saturating_sub(n);
            self.n_downloaded_requests += n;
            self.downloaded_batches.insert(batch.id.clone());
        }
        self.assert_disjoint();
    }

    pub fn progress(&self) -> Progress {
        Progress {
            batches_submitted: self.n_total_batches,
            requests_finished: self.n_finished_requests,
            requests_downloaded: self.n_downloaded_requests,
            requests_total: self.n_total_requests,
        }
    }

    fn assert_disjoint(&self) {
        debug_assert!(self.submitted_batches.is_disjoint(&self.finished_batches));
        debug_assert!(self.finished_batches.is_disjoint(&self.downloaded_batches));
        debug_assert!(self.submitted_batches.is_disjoint(&self.downloaded_batches));
        debug_assert!(
            self.n_finished_requests + self.n_downloaded_requests <= self.n_total_requests
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch_provider_client::types::{Batch, BatchRequestCounts, BatchStatus};

    fn batch(id: &str, total: u32, completed: u32, failed: u32) -> Batch {
        Batch {
            id: id.to_string(),
            object: "batch".to_string(),
            endpoint: "/v1/chat/completions".to_string(),
            errors: None,
            input_file_id: "file-in".to_string(),
            completion_window: "24h".to_string(),
            status: BatchStatus::Completed,
            output_file_id: Some("file-out".to_string()),
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
            request_counts: Some(BatchRequestCounts {
                total,
                completed,
                failed,
            }),
            metadata: None,
        }
    }

    #[test]
    fn lifecycle_transitions_update_counters_and_sets() {
        let file = PathBuf::from("requests_0.jsonl");
        let mut tracker = StatusTracker::new([file.clone()]);
        let b = batch("batch_1", 3, 2, 1);

        tracker.mark_as_submitted(&file, &b);
        assert!(!tracker.is_unsubmitted(&file));
        assert_eq!(tracker.progress().batches_submitted, 1);
        assert_eq!(tracker.progress().requests_total, 3);

        tracker.mark_as_finished(&b);
        assert_eq!(tracker.progress().requests_finished, 3);

        tracker.mark_as_downloaded(&b);
        assert_eq!(tracker.progress().requests_finished, 0);
        assert_eq!(tracker.progress().requests_downloaded, 3);
        assert!(tracker.is_downloaded("batch_1"));
    }

    #[test]
    fn finish_and_download_are_idempotent() {
        let file = PathBuf::from("requests_0.jsonl");
        let mut tracker = StatusTracker::new([file.clone()]);
        let b = batch("batch_1", 2, 2, 0);

        tracker.mark_as_submitted(&file, &b);
        tracker.mark_as_finished(&b);
        tracker.mark_as_finished(&b);
        assert_eq!(tracker.progress().requests_finished, 2);

        tracker.mark_as_downloaded(&b);
        tracker.mark_as_downloaded(&b);
        assert_eq!(tracker.progress().requests_downloaded, 2);
    }
}
