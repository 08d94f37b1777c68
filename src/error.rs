//! Error types for relay-dl
//!
//! Two layers of errors live here:
//! - [`Error`] is returned by fallible library calls (construction, submission,
//!   configuration loading, credential exchange, the API server).
//! - [`TaskError`] is what a task accumulates over its lifetime. Background loops
//!   never propagate errors to callers; every failure ends up in a task's error
//!   list and the task in the failed collection.
//!
//! [`UploadError`] is the classified failure an [`Uploader`](crate::transfer::Uploader)
//! session reports, which drives the upload retry protocol.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for relay-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for relay-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "chunk_size_mb")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL could not be parsed or uses an unsupported scheme
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Target filename would escape the download directory or is empty
    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    /// Credential exchange or credential storage failed
    #[error("authentication error: {0}")]
    Auth(String),

    /// An operation needs credentials that are not available yet, or the
    /// available ones cannot be refreshed
    #[error("credentials are not ready")]
    NotReady,

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Category of a failure recorded against a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// The downloader could not be started (bad URL, bad filename, unreachable host)
    Submission,
    /// The downloader finished unsuccessfully
    Download,
    /// A retryable server-side upload failure
    UploadTransient,
    /// The upload session expired and had to be rebuilt
    UploadStaleSession,
    /// A non-retryable upload failure
    UploadTerminal,
    /// The upload retry budget ran out on transient failures
    RetriesExhausted,
}

impl std::fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskErrorKind::Submission => "submission error",
            TaskErrorKind::Download => "download error",
            TaskErrorKind::UploadTransient => "transient upload error",
            TaskErrorKind::UploadStaleSession => "stale upload session",
            TaskErrorKind::UploadTerminal => "upload error",
            TaskErrorKind::RetriesExhausted => "retries exhausted",
        };
        f.write_str(label)
    }
}

/// A failure recorded in a task's error accumulator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    /// What stage of the pipeline failed
    pub kind: TaskErrorKind,
    /// Human-readable description of the failure
    pub message: String,
    /// Lower-level cause, if one was available
    pub cause: Option<String>,
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " ({cause})")?;
        }
        Ok(())
    }
}

impl std::error::Error for TaskError {}

impl TaskError {
    /// Create a task error without a cause
    pub fn new(kind: TaskErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Attach a lower-level cause
    pub fn with_cause(mut self, cause: impl std::fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    /// Build a submission error from a library error
    pub fn submission(error: &Error) -> Self {
        Self::new(TaskErrorKind::Submission, error.to_string())
    }

    /// Build a terminal upload error from a classified upload failure
    pub fn from_upload(error: &UploadError) -> Self {
        let kind = match error.failure {
            UploadFailure::StaleSession => TaskErrorKind::UploadStaleSession,
            UploadFailure::Transient => TaskErrorKind::UploadTransient,
            UploadFailure::Terminal => TaskErrorKind::UploadTerminal,
        };
        let err = Self::new(kind, error.message.clone());
        match error.status {
            Some(code) => err.with_cause(format!("HTTP {code}")),
            None => err,
        }
    }
}

/// How the upload loop must react to a failed chunk transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadFailure {
    /// The remote session no longer exists; rebuild it and start over
    StaleSession,
    /// The server is overloaded or unavailable; try again
    Transient,
    /// Anything else; give up on this task
    Terminal,
}

/// Classified failure reported by an upload session
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct UploadError {
    /// Classification driving the retry protocol
    pub failure: UploadFailure,
    /// HTTP status code, when the failure carried one
    pub status: Option<u16>,
    /// Human-readable description
    pub message: String,
}

impl UploadError {
    /// Classify a failure from the HTTP status code the storage service returned
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            failure: crate::retry::classify_status(status),
            status: Some(status),
            message: message.into(),
        }
    }

    /// A network-layer failure with no status code. Always terminal.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            failure: UploadFailure::Terminal,
            status: None,
            message: message.into(),
        }
    }
}

/// API error response format
///
/// ```json
/// {
///   "error": {
///     "code": "invalid_url",
///     "message": "invalid URL: ftp://example.com"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_ready", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidUrl(_) => 400,
            Error::InvalidFilename(_) => 400,
            Error::Auth(_) => 400,

            // 409 Conflict - credentials missing for the requested operation
            Error::NotReady => 409,

            // 500 Internal Server Error
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvalidUrl(_) => "invalid_url",
            Error::InvalidFilename(_) => "invalid_filename",
            Error::Auth(_) => "auth_error",
            Error::NotReady => "not_ready",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError::new(error.error_code().to_string(), error.to_string())
    }
}
