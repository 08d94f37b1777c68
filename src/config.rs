//! Configuration types for relay-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

/// Largest accepted upload chunk size, in megabytes
pub const MAX_CHUNK_SIZE_MB: u64 = 1024;

/// Main configuration for the [`Scheduler`](crate::Scheduler)
///
/// Every field has a default, so an empty JSON object is a valid configuration:
///
/// ```
/// let config: relay_dl::Config = serde_json::from_str("{}").unwrap();
/// assert_eq!(config.retry.attempts, 5);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory downloaded files are written to (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Storage service, credential and polling settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Upload retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.transport.chunk_size_mb == 0 {
            return Err(Error::Config {
                message: "chunk size must be at least 1 MB".to_string(),
                key: Some("chunk_size_mb".to_string()),
            });
        }
        if self.transport.chunk_size_mb > MAX_CHUNK_SIZE_MB {
            return Err(Error::Config {
                message: format!("chunk size must be at most {MAX_CHUNK_SIZE_MB} MB"),
                key: Some("chunk_size_mb".to_string()),
            });
        }
        if self.retry.attempts == 0 {
            return Err(Error::Config {
                message: "at least one upload attempt is required".to_string(),
                key: Some("attempts".to_string()),
            });
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::Config {
                message: format!(
                    "backoff multiplier must be a finite number of at least 1.0, got {multiplier}"
                ),
                key: Some("backoff_multiplier".to_string()),
            });
        }
        if self.transport.refresh_interval.is_zero() {
            return Err(Error::Config {
                message: "refresh interval must be greater than zero".to_string(),
                key: Some("refresh_interval".to_string()),
            });
        }
        Ok(())
    }
}

/// Storage service, credential and polling configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportConfig {
    /// OAuth scope requested during the authorization exchange
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Path to the OAuth client secret JSON file
    #[serde(default = "default_client_secret_file")]
    pub client_secret_file: PathBuf,

    /// Path credentials are persisted to after a successful exchange
    #[serde(default = "default_credential_file")]
    pub credential_file: PathBuf,

    /// Application name sent as the user agent to the authorization server
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Upload chunk size in megabytes (default: 10)
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: u64,

    /// Polling interval of the transition, upload and snapshot loops (default: 1 second)
    #[serde(default = "default_refresh_interval", with = "duration_serde")]
    pub refresh_interval: Duration,
}

impl TransportConfig {
    /// Upload chunk size in bytes
    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            client_secret_file: default_client_secret_file(),
            credential_file: default_credential_file(),
            application_name: default_application_name(),
            chunk_size_mb: default_chunk_size_mb(),
            refresh_interval: default_refresh_interval(),
        }
    }
}

/// Retry configuration for transient upload failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Number of upload attempts per task, including the first (default: 5)
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Delay before the first retry after a transient failure (default: 1 second)
    #[serde(default = "default_initial_delay", with = "millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address the API server binds to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Allow cross-origin requests from any origin (default: false)
    #[serde(default)]
    pub cors_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: false,
        }
    }
}

// Default value functions
fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_scope() -> String {
    "https://www.googleapis.com/auth/drive.file".to_string()
}

fn default_client_secret_file() -> PathBuf {
    PathBuf::from("client_secret.json")
}

fn default_credential_file() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_application_name() -> String {
    "relay-dl".to_string()
}

fn default_chunk_size_mb() -> u64 {
    10
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds), used for backoff delays
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
