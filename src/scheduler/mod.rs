//! Task lifecycle orchestration split into focused submodules.
//!
//! The [`Scheduler`] owns three task collections and three background loops:
//! - [`transition`] - moves finished downloads into the upload queue, deletes
//!   download-only files, or fails the task
//! - [`upload`] - drains the upload queue one task at a time with retry
//! - [`reporter`] - renders the collections into an immutable [`StatusSnapshot`]
//!
//! Supporting submodules:
//! - [`submission`] - task intake
//! - [`auth`] - the two-phase credential exchange
//! - [`lifecycle`] - starting and stopping the loops
//!
//! Tasks move between collections by value. The collections sit behind one
//! async mutex that is held only for in-memory bookkeeping, never across a
//! network call.

mod auth;
mod lifecycle;
mod reporter;
mod submission;
mod transition;
mod upload;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::Result;
use crate::task::Task;
use crate::transfer::{DownloadHandle, Downloader, Uploader};
use crate::types::StatusSnapshot;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};

/// A task whose downloader is running or has not been checked yet
pub(crate) struct PendingDownload {
    pub(crate) task: Task,
    pub(crate) handle: Box<dyn DownloadHandle>,
}

/// The three task collections
#[derive(Default)]
pub(crate) struct TaskCollections {
    /// Tasks whose downloader is active or not yet checked
    pub(crate) downloads: Vec<PendingDownload>,
    /// Upload queue (FIFO); the front task is the one being uploaded
    pub(crate) uploads: VecDeque<Task>,
    /// Tasks that ended in error; never drained
    pub(crate) failed: Vec<Task>,
}

/// Transfer capabilities the scheduler drives
#[derive(Clone)]
pub(crate) struct Capabilities {
    pub(crate) downloader: Arc<dyn Downloader>,
    pub(crate) uploader: Arc<dyn Uploader>,
    pub(crate) credential_store: Arc<dyn CredentialStore>,
}

/// Credential readiness
#[derive(Clone)]
pub(crate) struct AuthState {
    /// Flips to true once, when usable credentials are available
    pub(crate) ready: Arc<AtomicBool>,
    /// Current credentials (also serializes concurrent code exchanges)
    pub(crate) credentials: Arc<tokio::sync::RwLock<Option<Credentials>>>,
}

/// Background loop bookkeeping
#[derive(Clone)]
pub(crate) struct LifecycleState {
    /// Set to false during shutdown; submissions are rejected afterwards
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancelled on shutdown to stop the loops
    pub(crate) cancel_token: tokio_util::sync::CancellationToken,
    /// Join handles of the running loops
    pub(crate) loop_handles: Arc<tokio::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>>,
    /// Next task ID to hand out
    pub(crate) next_id: Arc<AtomicU64>,
}

/// Background download/upload task manager (cloneable - all fields are Arc-wrapped)
///
/// Construct one per process with [`Scheduler::new`], call [`Scheduler::start`]
/// to spawn the loops, then submit work with [`Scheduler::submit_task`] and
/// observe it with [`Scheduler::get_status`].
#[derive(Clone)]
pub struct Scheduler {
    /// Configuration (wrapped in Arc for sharing across loops)
    pub(crate) config: Arc<Config>,
    /// Downloader, uploader and credential store
    pub(crate) capabilities: Capabilities,
    /// Live task collections
    pub(crate) collections: Arc<tokio::sync::Mutex<TaskCollections>>,
    /// Credential readiness
    pub(crate) auth: AuthState,
    /// Latest published snapshot
    pub(crate) status_tx: Arc<tokio::sync::watch::Sender<Arc<StatusSnapshot>>>,
    /// Loop handles and shutdown flag
    pub(crate) lifecycle: LifecycleState,
}

impl Scheduler {
    /// Create a scheduler
    ///
    /// Validates the configuration, creates the download directory and loads
    /// any persisted credentials. The scheduler is auth-ready immediately if
    /// the stored credentials are valid. Loops are not started until
    /// [`start`](Self::start) is called.
    pub async fn new(
        config: Config,
        downloader: Arc<dyn Downloader>,
        uploader: Arc<dyn Uploader>,
        credential_store: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.download_dir).await?;

        let stored = match credential_store.load().await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load stored credentials, starting unauthenticated");
                None
            }
        };
        let valid = stored.filter(|creds| credential_store.is_valid(creds));
        let ready = valid.is_some();
        tracing::info!(auth_ready = ready, "Scheduler created");

        let (status_tx, _rx) = tokio::sync::watch::channel(Arc::new(StatusSnapshot::default()));

        Ok(Self {
            config: Arc::new(config),
            capabilities: Capabilities {
                downloader,
                uploader,
                credential_store,
            },
            collections: Arc::new(tokio::sync::Mutex::new(TaskCollections::default())),
            auth: AuthState {
                ready: Arc::new(AtomicBool::new(ready)),
                credentials: Arc::new(tokio::sync::RwLock::new(valid)),
            },
            status_tx: Arc::new(status_tx),
            lifecycle: LifecycleState {
                accepting_new: Arc::new(AtomicBool::new(true)),
                cancel_token: tokio_util::sync::CancellationToken::new(),
                loop_handles: Arc::new(tokio::sync::Mutex::new(Vec::new())),
                next_id: Arc::new(AtomicU64::new(1)),
            },
        })
    }

    /// Configuration the scheduler was built with
    pub fn config(&self) -> &Config {
        &self.config
    }
}
