//! Storage API credentials and the out-of-band authorization exchange
//!
//! Credentials are obtained once by a human operator: the scheduler hands out
//! an authorization URL, the operator visits it and pastes back a code, and the
//! [`CredentialStore`] swaps that code for tokens and persists them so later
//! process restarts start authorized. Expired access tokens are renewed with
//! the refresh token before an upload starts.

mod oauth;

pub use oauth::OAuthCredentialStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tokens for the storage service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token sent with upload requests
    pub access_token: String,
    /// Long-lived token used to mint new access tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token type reported by the authorization server, usually "Bearer"
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// When the access token stops working
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Set when the server has revoked these credentials
    #[serde(default)]
    pub invalid: bool,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credentials {
    /// True if the access token's expiry has passed
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Loads, obtains and persists [`Credentials`]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Credentials persisted by an earlier exchange, if any
    async fn load(&self) -> Result<Option<Credentials>>;

    /// Whether stored credentials can still be used for uploads
    ///
    /// The default accepts anything not revoked that either has a refresh
    /// token or an unexpired access token.
    fn is_valid(&self, credentials: &Credentials) -> bool {
        !credentials.invalid
            && !credentials.access_token.is_empty()
            && (credentials.refresh_token.is_some() || !credentials.is_expired())
    }

    /// URL the operator visits to obtain an authorization code
    fn authorization_url(&self) -> Result<String>;

    /// Trade an authorization code for credentials
    async fn exchange_code(&self, code: &str) -> Result<Credentials>;

    /// Mint a new access token from `credentials`' refresh token
    ///
    /// Returns [`Error::NotReady`](crate::Error::NotReady) when there is no
    /// refresh token to use.
    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials>;

    /// Save credentials for future process restarts
    async fn persist(&self, credentials: &Credentials) -> Result<()>;
}
