//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`tasks`] - submission and the status snapshot
//! - [`auth`] - the credential exchange
//! - [`system`] - health

use crate::types::TaskId;
use serde::{Deserialize, Serialize};

mod auth;
mod system;
mod tasks;

pub use auth::*;
pub use system::*;
pub use tasks::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Request body for POST /tasks
#[derive(Debug, Deserialize, Serialize)]
pub struct SubmitTaskRequest {
    /// Source URL
    pub url: String,
    /// Target filename inside the download directory
    pub filename: String,
    /// Queue for upload once downloaded (default: true)
    #[serde(default = "default_true")]
    pub upload_after_download: bool,
    /// Delete the local file once the task completes (default: true)
    #[serde(default = "default_true")]
    pub delete_after_complete: bool,
}

fn default_true() -> bool {
    true
}

/// Response for POST /tasks
#[derive(Debug, Deserialize, Serialize)]
pub struct SubmitTaskResponse {
    /// ID assigned to the new task
    pub id: TaskId,
}

/// Response for GET /auth and POST /auth/code
#[derive(Debug, Deserialize, Serialize)]
pub struct AuthStatusResponse {
    /// Whether valid credentials are available for uploads
    pub ready: bool,
}

/// Response for GET /auth/url
#[derive(Debug, Deserialize, Serialize)]
pub struct AuthUrlResponse {
    /// URL the user visits to obtain an authorization code
    pub url: String,
}

/// Request body for POST /auth/code
#[derive(Debug, Deserialize, Serialize)]
pub struct AuthCodeRequest {
    /// Code pasted back by the user
    pub code: String,
}
