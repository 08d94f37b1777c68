//! Application state for the API server

use crate::Scheduler;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request.
#[derive(Clone)]
pub struct AppState {
    /// The scheduler every route delegates to
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}
