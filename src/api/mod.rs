//! REST API server module
//!
//! A thin axum surface over a [`Scheduler`]: task submission, the status
//! snapshot and the two-phase credential exchange.

use crate::error::Error;
use crate::{Result, Scheduler};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Tasks
/// - `GET /status` - Latest status snapshot (downloads, uploads, failed)
/// - `POST /tasks` - Submit a URL for download
///
/// ## Credentials
/// - `GET /auth` - Whether uploads are authorized
/// - `GET /auth/url` - Authorization URL to present to the user
/// - `POST /auth/code` - Exchange the code the user pasted back
///
/// ## System
/// - `GET /health` - Health check
pub fn create_router(scheduler: Arc<Scheduler>) -> Router {
    let cors_enabled = scheduler.config().api.cors_enabled;
    let state = AppState::new(scheduler);

    let router = Router::new()
        .route("/status", get(routes::get_status))
        .route("/tasks", post(routes::submit_task))
        .route("/auth", get(routes::auth_status))
        .route("/auth/url", get(routes::auth_url))
        .route("/auth/code", post(routes::submit_auth_code))
        .route("/health", get(routes::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server stops or fails.
///
/// # Example
///
/// ```no_run
/// use relay_dl::{Config, Scheduler, OAuthCredentialStore, HttpDownloader};
/// use relay_dl::transfer::Uploader;
/// use std::sync::Arc;
///
/// # async fn example(uploader: Arc<dyn Uploader>) -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let store = Arc::new(OAuthCredentialStore::new(&config.transport)?);
/// let downloader = Arc::new(HttpDownloader::new(&config.transport.application_name)?);
/// let scheduler = Arc::new(Scheduler::new(config, downloader, uploader, store).await?);
///
/// scheduler.start().await;
/// relay_dl::api::start_api_server(scheduler).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(scheduler: Arc<Scheduler>) -> Result<()> {
    let bind_address = scheduler.config().api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(scheduler);
    let listener = TcpListener::bind(bind_address).await.map_err(Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}
