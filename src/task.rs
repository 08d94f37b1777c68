//! The unit of work: one file's journey from URL to uploaded object

use crate::error::TaskError;
use crate::types::{FailedRecord, TaskId, TaskPolicy, TaskStatus, TransferProgress, TransferRecord};
use crate::utils::{sizeof_human, time_human};
use std::path::PathBuf;

/// A submitted download/upload task
///
/// A task lives in exactly one of the scheduler's collections at a time and is
/// moved between them by value. Identity and policy never change after
/// construction; transfer state is overwritten by whichever loop owns the task,
/// and the error list only grows.
#[derive(Clone, Debug)]
pub struct Task {
    id: TaskId,
    url: String,
    filename: String,
    destination: PathBuf,
    policy: TaskPolicy,

    /// Current lifecycle status
    pub status: TaskStatus,
    /// Latest transfer counters
    pub progress: TransferProgress,

    errors: Vec<TaskError>,
}

impl Task {
    /// Create a task in the `Downloading` state
    pub fn new(
        id: TaskId,
        url: impl Into<String>,
        filename: impl Into<String>,
        destination: PathBuf,
        policy: TaskPolicy,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            filename: filename.into(),
            destination,
            policy,
            status: TaskStatus::Downloading,
            progress: TransferProgress::default(),
            errors: Vec::new(),
        }
    }

    /// Task ID
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Source URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Target filename inside the download directory
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Local path the file is downloaded to
    pub fn destination(&self) -> &PathBuf {
        &self.destination
    }

    /// Post-download policy
    pub fn policy(&self) -> TaskPolicy {
        self.policy
    }

    /// Errors recorded so far, oldest first
    pub fn errors(&self) -> &[TaskError] {
        &self.errors
    }

    /// Append an error to the accumulator
    pub fn record_error(&mut self, error: TaskError) {
        self.errors.push(error);
    }

    /// Record a terminal error and set the matching failed status
    pub fn fail(&mut self, status: TaskStatus, error: TaskError) {
        debug_assert!(status.is_failed());
        self.status = status;
        self.errors.push(error);
    }

    /// Zero the progress, speed, size and ETA display fields
    pub fn reset_progress(&mut self) {
        self.progress = TransferProgress::default();
    }

    /// Render a display record from the task's own transfer counters
    pub fn transfer_record(&self) -> TransferRecord {
        self.transfer_record_with(&self.progress)
    }

    /// Render a display record using counters supplied by a live transfer
    pub fn transfer_record_with(&self, progress: &TransferProgress) -> TransferRecord {
        TransferRecord {
            id: self.id,
            filename: self.filename.clone(),
            url: self.url.clone(),
            status: self.status.to_string(),
            completed_size: sizeof_human(progress.completed_bytes),
            file_size: sizeof_human(progress.total_bytes),
            speed: format!("{}/s", sizeof_human(progress.speed_bps)),
            progress: progress.progress,
            eta: time_human(progress.eta_secs, false),
        }
    }

    /// Render a record for the failed collection
    pub fn failed_record(&self) -> FailedRecord {
        FailedRecord {
            id: self.id,
            filename: self.filename.clone(),
            status: self.status.to_string(),
            errors: self.errors.iter().map(ToString::to_string).collect(),
        }
    }
}
