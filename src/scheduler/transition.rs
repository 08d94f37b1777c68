//! Reconciles the download collection against downloader completion.

use crate::error::{TaskError, TaskErrorKind};
use crate::types::TaskStatus;
use std::path::PathBuf;

use super::{Scheduler, TaskCollections};

impl Scheduler {
    /// Spawn the loop that routes finished downloads every refresh interval
    pub(crate) fn spawn_transition_loop(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        let cancel_token = self.lifecycle.cancel_token.clone();
        let refresh = self.config.transport.refresh_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(refresh);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scheduler.reconcile_downloads().await;
                    }
                    _ = cancel_token.cancelled() => {
                        tracing::debug!("Transition loop stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Run one transition pass
    ///
    /// Unfinished downloads stay put. Successful ones move to the upload queue
    /// or, for download-only tasks, are dropped (deleting the file if asked).
    /// Unsuccessful ones move to the failed collection with the downloader's
    /// errors recorded.
    pub(crate) async fn reconcile_downloads(&self) {
        let to_delete = {
            let mut collections = self.collections.lock().await;
            route_finished(&mut collections)
        };

        for path in to_delete {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Deleted download-only file"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete download-only file")
                }
            }
        }
    }
}

/// Move finished downloads out of the pending collection
///
/// Walks a detached copy of the collection so every entry is visited exactly
/// once. Returns the paths of download-only files to delete.
fn route_finished(collections: &mut TaskCollections) -> Vec<PathBuf> {
    let pending = std::mem::take(&mut collections.downloads);
    let mut to_delete = Vec::new();

    for entry in pending {
        if !entry.handle.is_finished() {
            collections.downloads.push(entry);
            continue;
        }

        let mut task = entry.task;
        let id = task.id();

        if entry.handle.is_successful() {
            let policy = task.policy();
            if policy.upload_after_download {
                task.reset_progress();
                task.status = TaskStatus::WaitingToUpload;
                tracing::info!(task_id = id.0, filename = task.filename(), "Download complete, queued for upload");
                collections.uploads.push_back(task);
            } else {
                tracing::info!(
                    task_id = id.0,
                    filename = task.filename(),
                    delete = policy.delete_after_complete,
                    "Download complete, no upload requested"
                );
                if policy.delete_after_complete {
                    to_delete.push(task.destination().clone());
                }
            }
            continue;
        }

        let errors = entry.handle.errors();
        if errors.is_empty() {
            task.record_error(TaskError::new(
                TaskErrorKind::Download,
                "download finished unsuccessfully",
            ));
        }
        for message in errors {
            task.record_error(TaskError::new(TaskErrorKind::Download, message));
        }
        task.progress = entry.handle.progress();
        task.status = TaskStatus::DownloadError;

        tracing::error!(task_id = id.0, filename = task.filename(), "Download failed");
        collections.failed.push(task);
    }

    to_delete
}
