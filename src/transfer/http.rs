//! Streaming HTTP(S) downloader

use super::{DownloadHandle, Downloader};
use crate::error::{Error, Result};
use crate::types::TransferProgress;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Downloads a URL with a single streaming GET
#[derive(Clone, Debug)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    /// Create a downloader with its own HTTP client
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    /// Create a downloader sharing an existing HTTP client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn start(&self, url: &str, destination: &Path) -> Result<Box<dyn DownloadHandle>> {
        let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "{url}: unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = File::create(destination).await?;

        let state = Arc::new(TransferState::new());
        let client = self.client.clone();
        let task_state = Arc::clone(&state);

        tracing::debug!(url = %parsed, destination = %destination.display(), "starting download");

        tokio::spawn(async move {
            let result = stream_to_file(client, parsed, file, &task_state).await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "download failed");
            }
            task_state.finish(result);
        });

        Ok(Box::new(HttpDownloadHandle { state }))
    }
}

async fn stream_to_file(
    client: reqwest::Client,
    url: url::Url,
    mut file: File,
    state: &TransferState,
) -> Result<()> {
    let response = client.get(url).send().await?.error_for_status()?;
    if let Some(len) = response.content_length() {
        state.total.store(len, Ordering::Relaxed);
    }

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        state.completed.fetch_add(chunk.len() as u64, Ordering::Relaxed);
    }
    file.flush().await?;

    // Chunked responses carry no length up front
    if state.total.load(Ordering::Relaxed) == 0 {
        state
            .total
            .store(state.completed.load(Ordering::Relaxed), Ordering::Relaxed);
    }
    Ok(())
}

/// Counters shared between the streaming task and its handle
struct TransferState {
    started: Instant,
    completed: AtomicU64,
    total: AtomicU64,
    successful: AtomicBool,
    finished: AtomicBool,
    errors: OnceLock<Vec<String>>,
}

impl TransferState {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            completed: AtomicU64::new(0),
            total: AtomicU64::new(0),
            successful: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            errors: OnceLock::new(),
        }
    }

    fn finish(&self, result: Result<()>) {
        let errors = match &result {
            Ok(()) => Vec::new(),
            Err(e) => vec![e.to_string()],
        };
        let _ = self.errors.set(errors);
        self.successful.store(result.is_ok(), Ordering::Release);
        self.finished.store(true, Ordering::Release);
    }
}

struct HttpDownloadHandle {
    state: Arc<TransferState>,
}

impl DownloadHandle for HttpDownloadHandle {
    fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }

    fn is_successful(&self) -> bool {
        self.is_finished() && self.state.successful.load(Ordering::Acquire)
    }

    fn progress(&self) -> TransferProgress {
        let completed = self.state.completed.load(Ordering::Relaxed);
        let total = self.state.total.load(Ordering::Relaxed);

        let progress = if total > 0 {
            (completed as f64 / total as f64).min(1.0)
        } else {
            0.0
        };

        if self.is_finished() {
            return TransferProgress {
                progress,
                speed_bps: 0,
                completed_bytes: completed,
                total_bytes: total,
                eta_secs: 0,
            };
        }

        let elapsed = self.state.started.elapsed().as_secs_f64();
        let speed_bps = if elapsed > 0.0 {
            (completed as f64 / elapsed) as u64
        } else {
            0
        };
        let eta_secs = if speed_bps > 0 {
            total.saturating_sub(completed) / speed_bps
        } else {
            0
        };

        TransferProgress {
            progress,
            speed_bps,
            completed_bytes: completed,
            total_bytes: total,
            eta_secs,
        }
    }

    fn errors(&self) -> Vec<String> {
        self.state.errors.get().cloned().unwrap_or_default()
    }
}
