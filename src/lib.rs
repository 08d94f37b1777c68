//! # relay-dl
//!
//! Background manager that downloads files from URLs and relays them to
//! remote object storage.
//!
//! ## Design Philosophy
//!
//! relay-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Pluggable** - Downloading, uploading and credential storage are traits
//! - **Snapshot-based** - Consumers read an immutable status snapshot refreshed
//!   on a fixed interval instead of touching live task state
//!
//! A submitted task is downloaded to the download directory, queued for upload
//! once the download succeeds, and uploaded serially with retries. Uploads wait
//! until credentials are available; the two-phase credential exchange
//! ([`Scheduler::authorization_url`] then
//! [`Scheduler::submit_authorization_code`]) can happen at any time.
//!
//! ## Quick Start
//!
//! ```no_run
//! use relay_dl::{Config, HttpDownloader, OAuthCredentialStore, Scheduler, TaskPolicy};
//! use relay_dl::transfer::Uploader;
//! use std::sync::Arc;
//!
//! # async fn example(uploader: Arc<dyn Uploader>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let downloader = Arc::new(HttpDownloader::new(&config.transport.application_name)?);
//! let store = Arc::new(OAuthCredentialStore::new(&config.transport)?);
//!
//! let scheduler = Scheduler::new(config, downloader, uploader, store).await?;
//! scheduler.start().await;
//!
//! if !scheduler.is_auth_ready() {
//!     println!("Visit {}", scheduler.authorization_url()?);
//! }
//!
//! scheduler
//!     .submit_task("https://example.com/big.iso", "big.iso", TaskPolicy::default())
//!     .await?;
//!
//! let status = scheduler.get_status();
//! println!("{} downloading, {} queued", status.downloads.len(), status.uploads.len());
//!
//! relay_dl::run_with_shutdown(scheduler).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Credentials and the credential exchange
pub mod credentials;
/// Error types
pub mod error;
/// Upload failure classification and backoff
pub mod retry;
/// Task orchestration: collections, background loops and lifecycle
pub mod scheduler;
/// The task model
pub mod task;
/// Download and upload capabilities
pub mod transfer;
/// Core types and status records
pub mod types;
/// Formatting helpers
pub mod utils;

// Re-export commonly used types
pub use config::{ApiConfig, Config, RetryConfig, TransportConfig};
pub use credentials::{CredentialStore, Credentials, OAuthCredentialStore};
pub use error::{
    ApiError, Error, ErrorDetail, Result, TaskError, TaskErrorKind, ToHttpStatus, UploadError,
    UploadFailure,
};
pub use scheduler::Scheduler;
pub use task::Task;
pub use transfer::HttpDownloader;
pub use types::{
    FailedRecord, StatusSnapshot, TaskId, TaskPolicy, TaskStatus, TransferProgress,
    TransferRecord,
};

/// Run the scheduler until a termination signal arrives, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use relay_dl::{Scheduler, run_with_shutdown};
///
/// # async fn example(scheduler: Scheduler) -> Result<(), Box<dyn std::error::Error>> {
/// scheduler.start().await;
/// run_with_shutdown(scheduler).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(scheduler: Scheduler) -> Result<()> {
    wait_for_signal().await;
    scheduler.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
