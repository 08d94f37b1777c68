//! Common test utilities for relay-dl pipeline tests

use async_trait::async_trait;
use relay_dl::transfer::{ChunkOutcome, ChunkProgress, UploadRequest, UploadSession, Uploader};
use relay_dl::{
    Config, Credentials, HttpDownloader, OAuthCredentialStore, Scheduler, StatusSnapshot,
    UploadError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Authorization code the mock token endpoint accepts
pub const VALID_CODE: &str = "valid-code";

/// In-memory object store standing in for a resumable upload API
///
/// Each session reads the local file once and "sends" it `chunk_size` bytes at
/// a time. Status codes queued with [`fail_next`](Self::fail_next) are returned
/// by the next chunk calls instead of progress.
#[derive(Default)]
pub struct MemoryUploader {
    stored: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failures: Arc<Mutex<VecDeque<u16>>>,
    sessions: Mutex<Vec<(String, String)>>,
    tokens: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MemoryUploader {
    /// Queue HTTP status failures for the next chunk calls
    pub fn fail_next(&self, statuses: impl IntoIterator<Item = u16>) {
        self.failures.lock().unwrap().extend(statuses);
    }

    /// Bytes stored under `name`, once its upload completed
    pub fn object(&self, name: &str) -> Option<Vec<u8>> {
        self.stored.lock().unwrap().get(name).cloned()
    }

    /// Number of completed uploads
    pub fn object_count(&self) -> usize {
        self.stored.lock().unwrap().len()
    }

    /// Access token presented for every session opened, in order
    pub fn session_tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    /// `(display_name, mime_type)` of every session opened, in order
    pub fn sessions(&self) -> Vec<(String, String)> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for MemoryUploader {
    async fn create_session(
        &self,
        credentials: &Credentials,
        request: &UploadRequest,
    ) -> Result<Box<dyn UploadSession>, UploadError> {
        if credentials.access_token.is_empty() {
            return Err(UploadError::from_status(401, "missing access token"));
        }

        let data = tokio::fs::read(&request.local_path)
            .await
            .map_err(|e| UploadError::network(e.to_string()))?;

        self.sessions
            .lock()
            .unwrap()
            .push((request.display_name.clone(), request.mime_type.clone()));
        self.tokens
            .lock()
            .unwrap()
            .push(credentials.access_token.clone());

        Ok(Box::new(MemorySession {
            name: request.display_name.clone(),
            data,
            offset: 0,
            chunk_size: request.chunk_size as usize,
            stored: Arc::clone(&self.stored),
            failures: Arc::clone(&self.failures),
        }))
    }
}

struct MemorySession {
    name: String,
    data: Vec<u8>,
    offset: usize,
    chunk_size: usize,
    stored: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failures: Arc<Mutex<VecDeque<u16>>>,
}

#[async_trait]
impl UploadSession for MemorySession {
    async fn next_chunk(&mut self) -> Result<ChunkOutcome, UploadError> {
        let failure = self.failures.lock().unwrap().pop_front();
        if let Some(status) = failure {
            return Err(UploadError::from_status(status, format!("HTTP {status}")));
        }

        self.offset = (self.offset + self.chunk_size).min(self.data.len());
        if self.offset == self.data.len() {
            self.stored
                .lock()
                .unwrap()
                .insert(self.name.clone(), self.data.clone());
            return Ok(ChunkOutcome::Complete);
        }

        Ok(ChunkOutcome::Progress(ChunkProgress {
            transferred_bytes: self.offset as u64,
            total_bytes: self.data.len() as u64,
        }))
    }
}

/// A running scheduler wired to a mock HTTP origin and token endpoint
pub struct Pipeline {
    pub scheduler: Scheduler,
    pub uploader: Arc<MemoryUploader>,
    pub server: MockServer,
    pub temp_dir: TempDir,
}

#[allow(dead_code)]
impl Pipeline {
    /// URL of `file_path` on the mock origin
    pub fn url(&self, file_path: &str) -> String {
        format!("{}{}", self.server.uri(), file_path)
    }

    /// Serve `body` at `file_path`
    pub async fn serve(&self, file_path: &str, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(file_path))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(&self.server)
            .await;
    }

    /// Local path a task's file is downloaded to
    pub fn local_file(&self, filename: &str) -> std::path::PathBuf {
        self.temp_dir.path().join("downloads").join(filename)
    }
}

/// Build and start a scheduler using the real HTTP downloader and OAuth store
///
/// The OAuth client secret points its token endpoint at the mock server,
/// which accepts [`VALID_CODE`] and any refresh token. When `authorized` is
/// true a credential file is written first so the scheduler starts ready.
pub async fn start_pipeline(authorized: bool, chunk_size_mb: u64) -> Pipeline {
    let stored = authorized.then(|| {
        serde_json::json!({
            "access_token": "stored-token",
            "refresh_token": "stored-refresh",
        })
    });
    start_pipeline_with(stored, chunk_size_mb).await
}

/// Like [`start_pipeline`], with `stored` written as the credential file
pub async fn start_pipeline_with(
    stored: Option<serde_json::Value>,
    chunk_size_mb: u64,
) -> Pipeline {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();

    mount_token_endpoint(&server).await;

    let secret_path = temp_dir.path().join("client_secret.json");
    let secret = serde_json::json!({
        "installed": {
            "client_id": "relay-test",
            "client_secret": "secret",
            "auth_uri": format!("{}/auth", server.uri()),
            "token_uri": format!("{}/token", server.uri()),
        }
    });
    std::fs::write(&secret_path, secret.to_string()).unwrap();

    let credential_path = temp_dir.path().join("state/credentials.json");
    if let Some(credentials) = stored {
        std::fs::create_dir_all(credential_path.parent().unwrap()).unwrap();
        std::fs::write(&credential_path, credentials.to_string()).unwrap();
    }

    let mut config = Config::default();
    config.download_dir = temp_dir.path().join("downloads");
    config.transport.client_secret_file = secret_path;
    config.transport.credential_file = credential_path;
    config.transport.chunk_size_mb = chunk_size_mb;
    config.transport.refresh_interval = Duration::from_millis(50);
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(10);
    config.retry.jitter = false;

    let downloader = Arc::new(HttpDownloader::new(&config.transport.application_name).unwrap());
    let store = Arc::new(OAuthCredentialStore::new(&config.transport).unwrap());
    let uploader = Arc::new(MemoryUploader::default());

    let scheduler = Scheduler::new(config, downloader, uploader.clone(), store)
        .await
        .unwrap();
    scheduler.start().await;

    Pipeline {
        scheduler,
        uploader,
        server,
        temp_dir,
    }
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=valid-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-token",
            "refresh_token": "fresh-refresh",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "renewed-token",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Malformed auth code.",
        })))
        .mount(server)
        .await;
}

/// Wait until a published snapshot satisfies `check`
///
/// Returns the matching snapshot, or panics with the last one after `timeout`.
pub async fn wait_for_status(
    scheduler: &Scheduler,
    timeout: Duration,
    check: impl Fn(&StatusSnapshot) -> bool,
) -> Arc<StatusSnapshot> {
    let mut rx = scheduler.subscribe_status();
    let result = tokio::time::timeout(timeout, async {
        loop {
            let current = rx.borrow_and_update().clone();
            if check(&current) {
                return current;
            }
            if rx.changed().await.is_err() {
                return current;
            }
        }
    })
    .await;

    match result {
        Ok(snapshot) => snapshot,
        Err(_) => panic!(
            "status condition not reached within {timeout:?}; last snapshot: {:?}",
            scheduler.get_status()
        ),
    }
}
