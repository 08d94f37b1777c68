//! File-backed OAuth 2.0 credential store using the out-of-band code flow

use super::{CredentialStore, Credentials};
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Redirect URI telling the authorization server to display the code to the user
const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// OAuth client registration as found in a downloaded client secret file
#[derive(Clone, Debug, Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
}

/// Client secret files wrap the registration in an `installed` or `web` section
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Credential store that talks to an OAuth 2.0 authorization server and keeps
/// tokens in a JSON file
///
/// The client secret file is read once, when the store is created. A missing
/// file is not an error until an operation needs the client registration.
#[derive(Clone, Debug)]
pub struct OAuthCredentialStore {
    client: reqwest::Client,
    client_secret: Option<ClientSecret>,
    client_secret_file: PathBuf,
    credential_file: PathBuf,
    scope: String,
}

impl OAuthCredentialStore {
    /// Create a store from the transport settings
    ///
    /// Fails if the client secret file exists but cannot be read or parsed.
    pub fn new(transport: &TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(transport.application_name.as_str())
            .build()?;
        let client_secret = read_client_secret(&transport.client_secret_file)?;

        Ok(Self {
            client,
            client_secret,
            client_secret_file: transport.client_secret_file.clone(),
            credential_file: transport.credential_file.clone(),
            scope: transport.scope.clone(),
        })
    }

    fn client_secret(&self) -> Result<&ClientSecret> {
        self.client_secret.as_ref().ok_or_else(|| {
            Error::Auth(format!(
                "client secret {} not found",
                self.client_secret_file.display()
            ))
        })
    }

    /// POST a grant to the token endpoint and turn the answer into credentials
    ///
    /// `previous_refresh_token` is kept when the server does not issue a new one.
    async fn request_token(
        &self,
        secret: &ClientSecret,
        form: &[(&str, &str)],
        previous_refresh_token: Option<&str>,
    ) -> Result<Credentials> {
        let response = self.client.post(&secret.token_uri).form(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => body,
            };
            return Err(Error::Auth(format!(
                "token request rejected (HTTP {}): {}",
                status.as_u16(),
                reason
            )));
        }

        let token: TokenResponse = response.json().await?;
        let expires_at = token
            .expires_in
            .map(|secs| chrono::Utc::now() + chrono::Duration::seconds(secs));

        Ok(Credentials {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .or_else(|| previous_refresh_token.map(str::to_string)),
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at,
            invalid: false,
        })
    }
}

fn read_client_secret(path: &Path) -> Result<Option<ClientSecret>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no client secret file");
            return Ok(None);
        }
        Err(e) => {
            return Err(Error::Auth(format!(
                "failed to read client secret {}: {}",
                path.display(),
                e
            )));
        }
    };
    let file: ClientSecretFile = serde_json::from_str(&raw)?;

    file.installed.or(file.web).map(Some).ok_or_else(|| {
        Error::Auth(format!(
            "client secret {} has neither an 'installed' nor a 'web' section",
            path.display()
        ))
    })
}

#[async_trait]
impl CredentialStore for OAuthCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>> {
        let raw = match tokio::fs::read(&self.credential_file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    fn authorization_url(&self) -> Result<String> {
        let secret = self.client_secret()?;
        let url = url::Url::parse_with_params(
            &secret.auth_uri,
            &[
                ("client_id", secret.client_id.as_str()),
                ("redirect_uri", OOB_REDIRECT_URI),
                ("scope", self.scope.as_str()),
                ("response_type", "code"),
                ("access_type", "offline"),
            ],
        )
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", secret.auth_uri, e)))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<Credentials> {
        let secret = self.client_secret()?;
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("redirect_uri", OOB_REDIRECT_URI),
        ];

        let credentials = self.request_token(secret, &form, None).await?;
        tracing::info!("authorization code exchanged for credentials");
        Ok(credentials)
    }

    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials> {
        let Some(refresh_token) = credentials.refresh_token.as_deref() else {
            return Err(Error::NotReady);
        };
        let secret = self.client_secret()?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
        ];

        let refreshed = self
            .request_token(secret, &form, Some(refresh_token))
            .await?;
        tracing::info!(expires_at = ?refreshed.expires_at, "access token refreshed");
        Ok(refreshed)
    }

    async fn persist(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.credential_file.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(credentials)?;
        tokio::fs::write(&self.credential_file, json).await?;

        tracing::debug!(path = %self.credential_file.display(), "credentials persisted");
        Ok(())
    }
}
