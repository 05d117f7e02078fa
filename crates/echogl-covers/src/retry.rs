//! Bounded retry with a fixed delay

use crate::CoverError;
use echogl_config::CoverSettings;
use std::future::Future;
use std::time::Duration;

/// Retries a whole operation a fixed number of times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl From<&CoverSettings> for RetryPolicy {
    fn from(settings: &CoverSettings) -> Self {
        Self {
            attempts: settings.retry_attempts.max(1),
            delay: settings.retry_delay(),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or the attempts are used up.
    /// Returns the last error when every attempt failed.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, CoverError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoverError>>,
    {
        let attempts = self.attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                tracing::debug!(
                    "{}: retry attempt {} of {} in {:?}",
                    label,
                    attempt + 1,
                    attempts,
                    self.delay
                );
                tokio::time::sleep(self.delay).await;
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!("{}: attempt {} failed: {}", label, attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(CoverError::Exhausted { attempts }))
    }
}
