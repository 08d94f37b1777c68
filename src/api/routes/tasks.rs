//! Task handlers.

use super::{SubmitTaskRequest, SubmitTaskResponse};
use crate::api::AppState;
use crate::error::Error;
use crate::types::{StatusSnapshot, TaskPolicy};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// GET /status - Latest published status snapshot
pub async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(StatusSnapshot::clone(&state.scheduler.get_status()))
}

/// POST /tasks - Submit a URL for download
///
/// Returns 202 once the download has been started. A task whose download
/// could not be started is still accepted and shows up in the failed
/// collection of the next snapshot.
pub async fn submit_task(
    State(state): State<AppState>,
    Json(request): Json<SubmitTaskRequest>,
) -> Result<impl IntoResponse, Error> {
    let policy = TaskPolicy {
        upload_after_download: request.upload_after_download,
        delete_after_complete: request.delete_after_complete,
    };

    let id = state
        .scheduler
        .submit_task(&request.url, &request.filename, policy)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(SubmitTaskResponse { id })))
}
