//! Two-phase credential exchange.

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use std::sync::atomic::Ordering;

use super::Scheduler;

impl Scheduler {
    /// True once usable credentials are available
    pub fn is_auth_ready(&self) -> bool {
        self.auth.ready.load(Ordering::SeqCst)
    }

    /// URL the operator visits to obtain an authorization code
    ///
    /// Has no effect on the stored credential state.
    pub fn authorization_url(&self) -> Result<String> {
        self.capabilities.credential_store.authorization_url()
    }

    /// Exchange an authorization code for credentials
    ///
    /// On success the credentials are persisted and the scheduler becomes
    /// auth-ready. Any failure (rejected code, unreachable server, persistence
    /// error) returns false and leaves the scheduler unauthenticated. Once
    /// ready, further calls return true without contacting the server.
    pub async fn submit_authorization_code(&self, code: &str) -> bool {
        let mut credentials = self.auth.credentials.write().await;
        if self.is_auth_ready() {
            tracing::debug!("Authorization code ignored, already authenticated");
            return true;
        }

        let store = &self.capabilities.credential_store;
        let exchanged = match store.exchange_code(code.trim()).await {
            Ok(exchanged) => exchanged,
            Err(e) => {
                tracing::warn!(error = %e, "Authorization code exchange failed");
                return false;
            }
        };

        if let Err(e) = store.persist(&exchanged).await {
            tracing::error!(error = %e, "Failed to persist credentials");
            return false;
        }

        *credentials = Some(exchanged);
        self.auth.ready.store(true, Ordering::SeqCst);
        tracing::info!("Authenticated with storage service");
        true
    }

    /// Credentials for the next upload, refreshed first if the access token expired
    ///
    /// A refreshed token is persisted and replaces the in-memory credentials.
    /// When the authorization server rejects the refresh, or there is no
    /// refresh token, the credentials are dropped and the scheduler stops
    /// being auth-ready until a new authorization code is submitted. Other
    /// refresh failures return `None` and are tried again on the next call.
    pub(crate) async fn usable_credentials(&self) -> Option<Credentials> {
        {
            let credentials = self.auth.credentials.read().await;
            match credentials.as_ref() {
                Some(current) if !current.is_expired() => return Some(current.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut credentials = self.auth.credentials.write().await;
        let current = credentials.as_ref()?;
        // Another caller may have refreshed while we waited for the lock
        if !current.is_expired() {
            return Some(current.clone());
        }

        let store = &self.capabilities.credential_store;
        let result = store.refresh(current).await;
        let refreshed = match result {
            Ok(refreshed) => refreshed,
            Err(e @ (Error::Auth(_) | Error::NotReady)) => {
                tracing::error!(
                    error = %e,
                    "Expired credentials cannot be refreshed, authorization required"
                );
                *credentials = None;
                self.auth.ready.store(false, Ordering::SeqCst);
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh expired credentials");
                return None;
            }
        };

        if let Err(e) = store.persist(&refreshed).await {
            tracing::warn!(error = %e, "Failed to persist refreshed credentials");
        }

        tracing::info!(expires_at = ?refreshed.expires_at, "Access token refreshed");
        *credentials = Some(refreshed.clone());
        Some(refreshed)
    }
}
