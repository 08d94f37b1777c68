//! Serial upload queue processing with retry.
//!
//! Only the front task of the upload queue is ever uploading. It stays at the
//! front (so it shows up in the status snapshot) until it either completes and
//! is removed, or fails and is moved to the failed collection.

use crate::credentials::Credentials;
use crate::error::{TaskError, TaskErrorKind, UploadError, UploadFailure};
use crate::retry::{Backoff, IsRetryable};
use crate::task::Task;
use crate::transfer::{ChunkOutcome, ChunkProgress, UploadRequest, UploadSession, guess_mime_type};
use crate::types::{TaskId, TaskStatus, TransferProgress};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Instant;

use super::Scheduler;

/// The queue head as seen by the upload loop
struct ActiveUpload {
    id: TaskId,
    local_path: PathBuf,
    filename: String,
    delete_after_complete: bool,
}

impl Scheduler {
    /// Spawn the loop that drains the upload queue
    ///
    /// Each tick uploads queued tasks back to back until the queue is empty or
    /// credentials are missing, then waits for the next tick.
    pub(crate) fn spawn_upload_loop(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        let cancel_token = self.lifecycle.cancel_token.clone();
        let refresh = self.config.transport.refresh_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(refresh);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        while !cancel_token.is_cancelled() && scheduler.upload_next().await {}
                    }
                    _ = cancel_token.cancelled() => {
                        tracing::debug!("Upload loop stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Upload the head of the queue, if credentials are ready and the queue is non-empty
    ///
    /// Returns true if a task was processed (successfully or not).
    pub(crate) async fn upload_next(&self) -> bool {
        if !self.auth.ready.load(Ordering::SeqCst) {
            return false;
        }
        let Some(credentials) = self.usable_credentials().await else {
            return false;
        };
        let Some(active) = self.begin_upload().await else {
            return false;
        };

        self.run_upload(&active, &credentials).await;
        true
    }

    /// Mark the queue head as uploading and describe it
    async fn begin_upload(&self) -> Option<ActiveUpload> {
        let mut collections = self.collections.lock().await;
        let task = collections.uploads.front_mut()?;
        task.status = TaskStatus::Uploading;

        Some(ActiveUpload {
            id: task.id(),
            local_path: task.destination().clone(),
            filename: task.filename().to_string(),
            delete_after_complete: task.policy().delete_after_complete,
        })
    }

    /// Drive one task through the retry protocol
    ///
    /// - stale session: drop the session, zero the progress, go again at once
    /// - transient: back off, then resume with the same session
    /// - terminal: fail the task with "upload error"
    ///
    /// If every attempt fails without a terminal error the task fails with
    /// "retries exhausted".
    async fn run_upload(&self, active: &ActiveUpload, credentials: &Credentials) {
        let request = UploadRequest {
            local_path: active.local_path.clone(),
            display_name: active.filename.clone(),
            mime_type: guess_mime_type(&active.filename).to_string(),
            chunk_size: self.config.transport.chunk_size_bytes(),
        };
        let attempts = self.config.retry.attempts;
        let mut backoff = Backoff::new(&self.config.retry);
        let mut session: Option<Box<dyn UploadSession>> = None;
        let mut last_error: Option<UploadError> = None;

        tracing::info!(task_id = active.id.0, filename = %active.filename, "Upload started");

        for attempt in 0..attempts {
            if attempt > 0 {
                self.update_head(active.id, |task| {
                    task.status = TaskStatus::Retrying { attempt };
                })
                .await;
            }

            let error = match self
                .drive_session(active.id, credentials, &request, &mut session)
                .await
            {
                Ok(()) => {
                    self.complete_upload(active).await;
                    return;
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                tracing::error!(task_id = active.id.0, error = %error, "Upload failed");
                self.fail_head(
                    active.id,
                    TaskStatus::UploadError,
                    TaskError::from_upload(&error),
                )
                .await;
                return;
            }

            if error.failure == UploadFailure::StaleSession {
                tracing::warn!(
                    task_id = active.id.0,
                    attempt,
                    error = %error,
                    "Upload session expired, restarting from scratch"
                );
                session = None;
                self.update_head(active.id, Task::reset_progress).await;
            } else {
                tracing::warn!(
                    task_id = active.id.0,
                    attempt,
                    max_attempts = attempts,
                    error = %error,
                    "Transient upload failure"
                );
                if attempt + 1 < attempts {
                    tokio::time::sleep(backoff.next_delay()).await;
                }
            }
            last_error = Some(error);
        }

        tracing::error!(task_id = active.id.0, attempts, "Upload retries exhausted");
        let mut error = TaskError::new(
            TaskErrorKind::RetriesExhausted,
            format!("gave up after {attempts} attempts"),
        );
        if let Some(last) = last_error {
            error = error.with_cause(TaskError::from_upload(&last));
        }
        self.fail_head(active.id, TaskStatus::RetriesExhausted, error)
            .await;
    }

    /// Send chunks until the session completes or a chunk fails
    ///
    /// Opens a session first if there is none.
    async fn drive_session(
        &self,
        id: TaskId,
        credentials: &Credentials,
        request: &UploadRequest,
        session: &mut Option<Box<dyn UploadSession>>,
    ) -> Result<(), UploadError> {
        let session = match session {
            Some(session) => session,
            slot @ None => {
                let created = self
                    .capabilities
                    .uploader
                    .create_session(credentials, request)
                    .await?;
                slot.insert(created)
            }
        };

        let mut last_transferred = self.head_progress(id).await.completed_bytes;
        loop {
            let chunk_started = Instant::now();
            match session.next_chunk().await? {
                ChunkOutcome::Progress(chunk) => {
                    let progress = chunk_progress(&chunk, last_transferred, chunk_started);
                    last_transferred = chunk.transferred_bytes;
                    self.update_head(id, |task| task.progress = progress).await;
                }
                ChunkOutcome::Complete => return Ok(()),
            }
        }
    }

    /// Current progress of the queue head
    async fn head_progress(&self, id: TaskId) -> TransferProgress {
        let collections = self.collections.lock().await;
        collections
            .uploads
            .front()
            .filter(|task| task.id() == id)
            .map(|task| task.progress)
            .unwrap_or_default()
    }

    /// Apply `update` to the queue head if it is still task `id`
    async fn update_head(&self, id: TaskId, update: impl FnOnce(&mut Task)) {
        let mut collections = self.collections.lock().await;
        match collections.uploads.front_mut() {
            Some(task) if task.id() == id => update(task),
            _ => tracing::warn!(task_id = id.0, "Upload queue head changed unexpectedly"),
        }
    }

    /// Remove the finished head and delete its file if requested
    async fn complete_upload(&self, active: &ActiveUpload) {
        let removed = {
            let mut collections = self.collections.lock().await;
            match collections.uploads.front() {
                Some(task) if task.id() == active.id => collections.uploads.pop_front(),
                _ => None,
            }
        };
        if removed.is_none() {
            tracing::warn!(task_id = active.id.0, "Completed upload was no longer queued");
        }

        tracing::info!(task_id = active.id.0, filename = %active.filename, "Upload complete");

        if active.delete_after_complete
            && let Err(e) = tokio::fs::remove_file(&active.local_path).await
        {
            tracing::warn!(
                task_id = active.id.0,
                path = %active.local_path.display(),
                error = %e,
                "Failed to delete uploaded file"
            );
        }
    }

    /// Move the head to the failed collection with `error` recorded
    async fn fail_head(&self, id: TaskId, status: TaskStatus, error: TaskError) {
        let mut collections = self.collections.lock().await;
        let head = match collections.uploads.front() {
            Some(task) if task.id() == id => collections.uploads.pop_front(),
            _ => None,
        };
        match head {
            Some(mut task) => {
                task.fail(status, error);
                collections.failed.push(task);
            }
            None => tracing::warn!(task_id = id.0, "Failed upload was no longer queued"),
        }
    }
}

/// Derive display counters from one acknowledged chunk
///
/// Speed is the bytes this chunk moved over the time it took; ETA is the
/// remaining bytes at that speed.
fn chunk_progress(chunk: &ChunkProgress, previous: u64, started: Instant) -> TransferProgress {
    let sent = chunk.transferred_bytes.saturating_sub(previous);
    let elapsed = started.elapsed().as_secs_f64();
    let speed_bps = if elapsed > 0.0 {
        (sent as f64 / elapsed) as u64
    } else {
        0
    };
    let remaining = chunk.total_bytes.saturating_sub(chunk.transferred_bytes);
    let eta_secs = if speed_bps > 0 { remaining / speed_bps } else { 0 };
    let progress = if chunk.total_bytes > 0 {
        chunk.transferred_bytes as f64 / chunk.total_bytes as f64
    } else {
        0.0
    };

    TransferProgress {
        progress,
        speed_bps,
        completed_bytes: chunk.transferred_bytes,
        total_bytes: chunk.total_bytes,
        eta_secs,
    }
}
