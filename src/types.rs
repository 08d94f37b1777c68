//! Core types for relay-dl

use serde::{Deserialize, Serialize};

/// Unique identifier for a submitted task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Where a task is in its journey from URL to uploaded object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Downloader is running
    Downloading,
    /// Download succeeded; queued for upload
    WaitingToUpload,
    /// Head of the upload queue, first attempt
    Uploading,
    /// Head of the upload queue, retrying after a recoverable failure
    Retrying {
        /// Zero-based attempt number currently running
        attempt: u32,
    },
    /// Upload failed with a terminal error
    UploadError,
    /// Upload gave up after every attempt failed transiently
    RetriesExhausted,
    /// Downloader finished unsuccessfully
    DownloadError,
    /// Downloader could not be started
    SubmissionError,
}

impl TaskStatus {
    /// True for statuses that only appear in the failed collection
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            TaskStatus::UploadError
                | TaskStatus::RetriesExhausted
                | TaskStatus::DownloadError
                | TaskStatus::SubmissionError
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Downloading => f.write_str("downloading"),
            TaskStatus::WaitingToUpload => f.write_str("waiting to upload"),
            TaskStatus::Uploading => f.write_str("uploading"),
            TaskStatus::Retrying { attempt } => write!(f, "uploading retrying at {attempt}"),
            TaskStatus::UploadError => f.write_str("upload error"),
            TaskStatus::RetriesExhausted => f.write_str("retries exhausted"),
            TaskStatus::DownloadError => f.write_str("download error"),
            TaskStatus::SubmissionError => f.write_str("submission error"),
        }
    }
}

/// What happens to a task after its download succeeds
///
/// Fixed when the task is submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPolicy {
    /// Queue the file for upload once downloaded (default: true)
    #[serde(default = "default_true")]
    pub upload_after_download: bool,

    /// Remove the local file once the task completes (default: true)
    #[serde(default = "default_true")]
    pub delete_after_complete: bool,
}

impl Default for TaskPolicy {
    fn default() -> Self {
        Self {
            upload_after_download: true,
            delete_after_complete: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Point-in-time transfer counters reported by a download handle or upload session
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Fraction complete (0.0 to 1.0)
    pub progress: f64,
    /// Current speed in bytes per second
    pub speed_bps: u64,
    /// Bytes transferred so far
    pub completed_bytes: u64,
    /// Total bytes, 0 while unknown
    pub total_bytes: u64,
    /// Estimated seconds remaining
    pub eta_secs: u64,
}

/// Display record for a task that is downloading or in the upload queue
///
/// Byte counts, speed and ETA are pre-rendered with
/// [`sizeof_human`](crate::utils::sizeof_human) and [`time_human`](crate::utils::time_human).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Task ID
    pub id: TaskId,
    /// Target filename
    pub filename: String,
    /// Source URL
    pub url: String,
    /// Human-readable status
    pub status: String,
    /// Bytes transferred, human-readable
    pub completed_size: String,
    /// Total size, human-readable
    pub file_size: String,
    /// Speed, human-readable ("1.5 MB/s")
    pub speed: String,
    /// Fraction complete (0.0 to 1.0)
    pub progress: f64,
    /// Estimated time remaining, human-readable
    pub eta: String,
}

/// Display record for a task in the failed collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    /// Task ID
    pub id: TaskId,
    /// Target filename
    pub filename: String,
    /// Human-readable status
    pub status: String,
    /// Every error recorded against the task, oldest first
    pub errors: Vec<String>,
}

/// One consistent view of all three task collections
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Tasks whose downloader is active or not yet checked
    pub downloads: Vec<TransferRecord>,
    /// Upload queue in FIFO order; the head is the one uploading
    pub uploads: Vec<TransferRecord>,
    /// Tasks that ended in error
    pub failed: Vec<FailedRecord>,
}

impl StatusSnapshot {
    /// Total number of records across the three collections
    pub fn len(&self) -> usize {
        self.downloads.len() + self.uploads.len() + self.failed.len()
    }

    /// True when no task is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
