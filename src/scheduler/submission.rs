//! Task intake.

use crate::error::{Error, Result, TaskError};
use crate::task::Task;
use crate::types::{TaskId, TaskPolicy, TaskStatus};
use crate::utils::validate_filename;
use std::sync::atomic::Ordering;

use super::{PendingDownload, Scheduler};

impl Scheduler {
    /// Submit a URL to download into the download directory as `filename`
    ///
    /// Returns once the downloader has started (or failed to start), not when
    /// the download finishes. A task whose download cannot start goes straight
    /// to the failed collection with a submission error; the ID is returned
    /// either way so the caller can find it in the status snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown) was called.
    pub async fn submit_task(&self, url: &str, filename: &str, policy: TaskPolicy) -> Result<TaskId> {
        if !self.lifecycle.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let id = TaskId(self.lifecycle.next_id.fetch_add(1, Ordering::SeqCst));
        let destination = self.config.download_dir.join(filename);
        let mut task = Task::new(id, url, filename, destination, policy);

        let started = match validate_filename(filename) {
            Ok(()) => {
                self.capabilities
                    .downloader
                    .start(url, task.destination())
                    .await
            }
            Err(e) => Err(e),
        };

        let mut collections = self.collections.lock().await;
        match started {
            Ok(handle) => {
                tracing::info!(task_id = id.0, filename, url, "Download started");
                collections.downloads.push(PendingDownload { task, handle });
            }
            Err(e) => {
                tracing::error!(task_id = id.0, filename, url, error = %e, "Download could not start");
                task.fail(TaskStatus::SubmissionError, TaskError::submission(&e));
                collections.failed.push(task);
            }
        }

        Ok(id)
    }
}
