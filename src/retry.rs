//! Upload failure classification and retry backoff
//!
//! The storage service reports failures as HTTP status codes. They fall into
//! three groups that drive the upload loop:
//!
//! | Status                 | Meaning           | Reaction                          |
//! |------------------------|-------------------|-----------------------------------|
//! | 404                    | stale session     | rebuild the session, start over   |
//! | 500, 502, 503, 504     | transient         | back off, resume the same session |
//! | anything else          | terminal          | move the task to failed           |
//!
//! # Example
//!
//! ```
//! use relay_dl::config::RetryConfig;
//! use relay_dl::error::UploadFailure;
//! use relay_dl::retry::{Backoff, classify_status};
//!
//! assert_eq!(classify_status(503), UploadFailure::Transient);
//!
//! let mut backoff = Backoff::new(&RetryConfig { jitter: false, ..Default::default() });
//! assert_eq!(backoff.next_delay(), std::time::Duration::from_secs(1));
//! assert_eq!(backoff.next_delay(), std::time::Duration::from_secs(2));
//! ```

use crate::config::RetryConfig;
use crate::error::{UploadError, UploadFailure};
use rand::Rng;
use std::time::Duration;

/// Classify an HTTP status code returned by the storage service
pub fn classify_status(status: u16) -> UploadFailure {
    match status {
        404 => UploadFailure::StaleSession,
        500 | 502 | 503 | 504 => UploadFailure::Transient,
        _ => UploadFailure::Terminal,
    }
}

/// Trait for errors that can be classified as retryable or not
///
/// The upload loop keeps a task at the head of the queue while its failures
/// are retryable and moves it to the failed collection as soon as one is not.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for UploadError {
    fn is_retryable(&self) -> bool {
        // A stale session is retried too, but only after a rebuild
        matches!(
            self.failure,
            UploadFailure::Transient | UploadFailure::StaleSession
        )
    }
}

/// Exponential backoff state for one task's transient failures
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Backoff {
    /// Start a fresh backoff sequence from the configured initial delay
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            delay: config.initial_delay,
            max_delay: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }

    /// Delay to wait before the next attempt; advances the sequence
    ///
    /// A product that is negative, NaN or too large for a `Duration` is
    /// clamped to the maximum delay.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.delay;

        let next = Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max_delay);
        self.delay = next.min(self.max_delay);

        if self.jitter {
            add_jitter(current)
        } else {
            current
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
