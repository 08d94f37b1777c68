//! Byte-transfer capabilities the scheduler drives
//!
//! The scheduler never moves bytes itself. It starts downloads through a
//! [`Downloader`] and polls the returned [`DownloadHandle`], and it pushes
//! finished files to remote storage through an [`Uploader`] session one chunk
//! at a time.
//!
//! [`HttpDownloader`] is the bundled downloader. Uploaders are supplied by the
//! embedding application since the storage wire format is service specific.

mod http;

pub use http::HttpDownloader;

use crate::credentials::Credentials;
use crate::error::{Result, UploadError};
use crate::types::TransferProgress;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Starts downloads
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Begin fetching `url` into `destination`
    ///
    /// Returns as soon as the transfer has started. Errors here mean the
    /// transfer could not begin at all (malformed URL, unwritable directory).
    async fn start(&self, url: &str, destination: &Path) -> Result<Box<dyn DownloadHandle>>;
}

/// A download in progress
///
/// All queries are non-blocking snapshots of the transfer's state.
pub trait DownloadHandle: Send + Sync {
    /// True once the transfer has stopped, successfully or not
    fn is_finished(&self) -> bool;

    /// True if the transfer finished and the file is complete
    fn is_successful(&self) -> bool;

    /// Current transfer counters
    fn progress(&self) -> TransferProgress;

    /// Errors the transfer ran into, oldest first
    fn errors(&self) -> Vec<String>;
}

/// What to upload and how to chunk it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    /// Local file to upload
    pub local_path: PathBuf,
    /// Name the object gets in remote storage
    pub display_name: String,
    /// MIME type reported to the storage service
    pub mime_type: String,
    /// Bytes sent per chunk
    pub chunk_size: u64,
}

/// Progress reported after a chunk was accepted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkProgress {
    /// Bytes the service has acknowledged so far
    pub transferred_bytes: u64,
    /// Size of the whole file
    pub total_bytes: u64,
}

/// Result of sending one chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// More chunks remain
    Progress(ChunkProgress),
    /// The service has the whole file
    Complete,
}

/// Creates resumable upload sessions
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Open a resumable session for `request`
    async fn create_session(
        &self,
        credentials: &Credentials,
        request: &UploadRequest,
    ) -> std::result::Result<Box<dyn UploadSession>, UploadError>;
}

/// A resumable upload session
#[async_trait]
pub trait UploadSession: Send {
    /// Send the next chunk
    ///
    /// Failures must be classified (see [`UploadError::from_status`]) so the
    /// scheduler can decide between rebuilding the session, retrying, or giving up.
    async fn next_chunk(&mut self) -> std::result::Result<ChunkOutcome, UploadError>;
}

/// Guess a MIME type from a filename's extension
///
/// Falls back to `application/octet-stream`.
pub fn guess_mime_type(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("txt") | Some("log") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") | Some("tgz") => "application/gzip",
        Some("tar") => "application/x-tar",
        Some("7z") => "application/x-7z-compressed",
        Some("rar") => "application/vnd.rar",
        Some("iso") => "application/x-iso9660-image",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("wav") => "audio/wav",
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}
