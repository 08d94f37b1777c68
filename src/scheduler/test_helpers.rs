//! Shared test helpers: scripted transfer capabilities and scheduler construction.

use crate::config::Config;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{Error, Result, UploadError};
use crate::scheduler::Scheduler;
use crate::transfer::{
    ChunkOutcome, ChunkProgress, DownloadHandle, Downloader, UploadRequest, UploadSession, Uploader,
};
use crate::types::TransferProgress;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Content written by [`MockDownloader`] at every destination
pub(crate) const MOCK_FILE_CONTENT: &[u8] = b"mock download payload";

/// A download whose outcome the test decides
#[derive(Default)]
pub(crate) struct MockTransfer {
    finished: AtomicBool,
    successful: AtomicBool,
    errors: Mutex<Vec<String>>,
}

impl MockTransfer {
    pub(crate) fn succeed(&self) {
        self.successful.store(true, Ordering::SeqCst);
        self.finished.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail(&self, error: &str) {
        self.errors.lock().unwrap().push(error.to_string());
        self.finished.store(true, Ordering::SeqCst);
    }
}

struct MockHandle(Arc<MockTransfer>);

impl DownloadHandle for MockHandle {
    fn is_finished(&self) -> bool {
        self.0.finished.load(Ordering::SeqCst)
    }

    fn is_successful(&self) -> bool {
        self.0.successful.load(Ordering::SeqCst)
    }

    fn progress(&self) -> TransferProgress {
        let len = MOCK_FILE_CONTENT.len() as u64;
        if self.is_finished() {
            TransferProgress {
                progress: 1.0,
                completed_bytes: len,
                total_bytes: len,
                ..Default::default()
            }
        } else {
            TransferProgress {
                total_bytes: len,
                ..Default::default()
            }
        }
    }

    fn errors(&self) -> Vec<String> {
        self.0.errors.lock().unwrap().clone()
    }
}

/// Downloader that writes a fixed payload and lets the test finish each transfer
///
/// URLs starting with `bad://` fail to start.
#[derive(Default)]
pub(crate) struct MockDownloader {
    transfers: Mutex<Vec<(String, Arc<MockTransfer>)>>,
}

impl MockDownloader {
    /// Transfer started for `url`
    pub(crate) fn transfer(&self, url: &str) -> Arc<MockTransfer> {
        self.transfers
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, t)| Arc::clone(t))
            .unwrap_or_else(|| panic!("no transfer started for {url}"))
    }

    pub(crate) fn started_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    async fn start(&self, url: &str, destination: &Path) -> Result<Box<dyn DownloadHandle>> {
        if url.starts_with("bad://") {
            return Err(Error::InvalidUrl(url.to_string()));
        }
        tokio::fs::write(destination, MOCK_FILE_CONTENT).await?;

        let transfer = Arc::new(MockTransfer::default());
        self.transfers
            .lock()
            .unwrap()
            .push((url.to_string(), Arc::clone(&transfer)));
        Ok(Box::new(MockHandle(transfer)))
    }
}

/// What one `create_session` or `next_chunk` call returns
#[derive(Clone, Debug)]
pub(crate) enum Step {
    Chunk(ChunkOutcome),
    Fail(UploadError),
}

impl Step {
    pub(crate) fn progress(transferred_bytes: u64, total_bytes: u64) -> Self {
        Step::Chunk(ChunkOutcome::Progress(ChunkProgress {
            transferred_bytes,
            total_bytes,
        }))
    }

    pub(crate) fn complete() -> Self {
        Step::Chunk(ChunkOutcome::Complete)
    }

    pub(crate) fn status(code: u16) -> Self {
        Step::Fail(UploadError::from_status(code, format!("HTTP {code}")))
    }
}

#[derive(Default)]
struct UploadScript {
    chunks: VecDeque<Step>,
    session_failures: VecDeque<UploadError>,
    /// Used once the scripted chunks run out
    fallback: Option<Step>,
}

/// Call counters and script shared by a [`MockUploader`] and its sessions
#[derive(Default)]
pub(crate) struct UploadLog {
    script: Mutex<UploadScript>,
    /// `open:<name>`, `chunk:<name>`, `done:<name>` entries in call order
    entries: Mutex<Vec<String>>,
    /// Access token presented to every `create_session` call
    tokens: Mutex<Vec<String>>,
    pub(crate) sessions_created: AtomicUsize,
    pub(crate) chunk_calls: AtomicUsize,
    /// Delay applied to every chunk call
    chunk_delay: Mutex<Option<Duration>>,
}

impl UploadLog {
    fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap();
        script
            .chunks
            .pop_front()
            .or_else(|| script.fallback.clone())
            .unwrap_or_else(Step::complete)
    }
}

/// Uploader driven by a script of chunk results shared by all sessions
///
/// Every session and chunk call is logged so tests can assert ordering and
/// exact attempt counts. Once the script runs out chunks complete.
#[derive(Default)]
pub(crate) struct MockUploader {
    pub(crate) shared: Arc<UploadLog>,
}

impl MockUploader {
    pub(crate) fn with_chunks(steps: impl IntoIterator<Item = Step>) -> Self {
        let uploader = Self::default();
        uploader.shared.script.lock().unwrap().chunks.extend(steps);
        uploader
    }

    /// Return `step` for every chunk call after the script runs out
    pub(crate) fn always(step: Step) -> Self {
        let uploader = Self::default();
        uploader.shared.script.lock().unwrap().fallback = Some(step);
        uploader
    }

    pub(crate) fn fail_next_session(&self, error: UploadError) {
        self.shared
            .script
            .lock()
            .unwrap()
            .session_failures
            .push_back(error);
    }

    pub(crate) fn set_chunk_delay(&self, delay: Duration) {
        *self.shared.chunk_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.shared.entries.lock().unwrap().clone()
    }

    pub(crate) fn session_tokens(&self) -> Vec<String> {
        self.shared.tokens.lock().unwrap().clone()
    }

    pub(crate) fn sessions_created(&self) -> usize {
        self.shared.sessions_created.load(Ordering::SeqCst)
    }

    pub(crate) fn chunk_calls(&self) -> usize {
        self.shared.chunk_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn create_session(
        &self,
        credentials: &Credentials,
        request: &UploadRequest,
    ) -> std::result::Result<Box<dyn UploadSession>, UploadError> {
        self.shared.sessions_created.fetch_add(1, Ordering::SeqCst);
        self.shared
            .tokens
            .lock()
            .unwrap()
            .push(credentials.access_token.clone());
        self.shared.push(format!("open:{}", request.display_name));

        let failure = self.shared.script.lock().unwrap().session_failures.pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        Ok(Box::new(MockSession {
            shared: Arc::clone(&self.shared),
            name: request.display_name.clone(),
        }))
    }
}

/// Session that pulls chunk results from the shared script
struct MockSession {
    shared: Arc<UploadLog>,
    name: String,
}

#[async_trait]
impl UploadSession for MockSession {
    async fn next_chunk(&mut self) -> std::result::Result<ChunkOutcome, UploadError> {
        let delay = *self.shared.chunk_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.shared.chunk_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.push(format!("chunk:{}", self.name));

        match self.shared.next_step() {
            Step::Chunk(ChunkOutcome::Complete) => {
                self.shared.push(format!("done:{}", self.name));
                Ok(ChunkOutcome::Complete)
            }
            Step::Chunk(outcome) => Ok(outcome),
            Step::Fail(error) => Err(error),
        }
    }
}

/// Credential store accepting a single code
///
/// Refreshes hand out a token named "refreshed" valid for an hour, unless
/// `refresh_error` holds an error to return instead.
pub(crate) struct MockCredentialStore {
    pub(crate) stored: Mutex<Option<Credentials>>,
    pub(crate) valid_code: String,
    pub(crate) fail_persist: AtomicBool,
    pub(crate) exchanges: AtomicUsize,
    pub(crate) refreshes: AtomicUsize,
    pub(crate) refresh_error: Mutex<Option<fn() -> Error>>,
}

impl MockCredentialStore {
    pub(crate) fn empty() -> Self {
        Self {
            stored: Mutex::new(None),
            valid_code: "good-code".to_string(),
            fail_persist: AtomicBool::new(false),
            exchanges: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            refresh_error: Mutex::new(None),
        }
    }

    pub(crate) fn authorized() -> Self {
        let store = Self::empty();
        *store.stored.lock().unwrap() = Some(test_credentials());
        store
    }

    /// Stored credentials whose access token expired a minute ago
    pub(crate) fn expired(refresh_token: Option<&str>) -> Self {
        let store = Self::empty();
        *store.stored.lock().unwrap() = Some(Credentials {
            access_token: "stale".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at: Some(chrono::Utc::now() - chrono::Duration::minutes(1)),
            ..test_credentials()
        });
        store
    }

    pub(crate) fn fail_refresh_with(&self, error: fn() -> Error) {
        *self.refresh_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

pub(crate) fn test_credentials() -> Credentials {
    Credentials {
        access_token: "access".to_string(),
        refresh_token: Some("refresh".to_string()),
        token_type: "Bearer".to_string(),
        expires_at: None,
        invalid: false,
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>> {
        Ok(self.stored.lock().unwrap().clone())
    }

    fn authorization_url(&self) -> Result<String> {
        Ok("https://auth.example.com/authorize?client_id=test".to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<Credentials> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code == self.valid_code {
            Ok(test_credentials())
        } else {
            Err(Error::Auth("invalid_grant".to_string()))
        }
    }

    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let failure = *self.refresh_error.lock().unwrap();
        if let Some(error) = failure {
            return Err(error());
        }
        if credentials.refresh_token.is_none() {
            return Err(Error::NotReady);
        }
        Ok(Credentials {
            access_token: "refreshed".to_string(),
            expires_at: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
            ..credentials.clone()
        })
    }

    async fn persist(&self, credentials: &Credentials) -> Result<()> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("read-only credential file")));
        }
        *self.stored.lock().unwrap() = Some(credentials.clone());
        Ok(())
    }
}

/// A scheduler under test together with its collaborators
pub(crate) struct Harness {
    pub(crate) scheduler: Scheduler,
    pub(crate) downloader: Arc<MockDownloader>,
    pub(crate) uploader: Arc<MockUploader>,
    pub(crate) store: Arc<MockCredentialStore>,
    pub(crate) temp_dir: tempfile::TempDir,
}

/// Config with a short refresh interval, no backoff jitter and 1 ms retry delays
pub(crate) fn test_config(download_dir: &Path, attempts: u32) -> Config {
    let mut config = Config::default();
    config.download_dir = download_dir.to_path_buf();
    config.transport.refresh_interval = Duration::from_secs(1);
    config.retry.attempts = attempts;
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(5);
    config.retry.jitter = false;
    config
}

/// Build a scheduler (loops not started) around the given mocks
pub(crate) async fn create_test_scheduler(
    uploader: MockUploader,
    store: MockCredentialStore,
    attempts: u32,
) -> Harness {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(&temp_dir.path().join("downloads"), attempts);

    let downloader = Arc::new(MockDownloader::default());
    let uploader = Arc::new(uploader);
    let store = Arc::new(store);

    let scheduler = Scheduler::new(
        config,
        downloader.clone(),
        uploader.clone(),
        store.clone(),
    )
    .await
    .unwrap();

    Harness {
        scheduler,
        downloader,
        uploader,
        store,
        temp_dir,
    }
}
