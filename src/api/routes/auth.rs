//! Credential exchange handlers.

use super::{AuthCodeRequest, AuthStatusResponse, AuthUrlResponse};
use crate::api::AppState;
use crate::error::{ApiError, Error};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /auth - Whether uploads are authorized
pub async fn auth_status(State(state): State<AppState>) -> Json<AuthStatusResponse> {
    Json(AuthStatusResponse {
        ready: state.scheduler.is_auth_ready(),
    })
}

/// GET /auth/url - Authorization URL for the first phase of the exchange
pub async fn auth_url(State(state): State<AppState>) -> Result<Json<AuthUrlResponse>, Error> {
    let url = state.scheduler.authorization_url()?;
    Ok(Json(AuthUrlResponse { url }))
}

/// POST /auth/code - Second phase: exchange the pasted code for credentials
pub async fn submit_auth_code(
    State(state): State<AppState>,
    Json(request): Json<AuthCodeRequest>,
) -> Response {
    if state.scheduler.submit_authorization_code(&request.code).await {
        (StatusCode::OK, Json(AuthStatusResponse { ready: true })).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::unauthorized("authorization code was rejected")),
        )
            .into_response()
    }
}
