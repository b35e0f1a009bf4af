//! Bounded retry of remote calls.
//!
//! Only connection failures are retried. Once the attempts are used up the
//! error is returned to the caller, which treats it as fatal; every other
//! error is returned immediately and only costs the caller one iteration.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::Result;

/// How many times to try a remote call, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before each retry, in milliseconds.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 0,
        }
    }
}

impl RetryPolicy {
    /// Delay between attempts.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Run `operation`, retrying connection failures.
    ///
    /// # Errors
    ///
    /// Returns the last connection error once all attempts fail, or the first
    /// error of any other kind.
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_connection() => {
                    if attempt >= attempts {
                        error!("FordPass Connect API unavailable ({what}): {e}");
                        return Err(e);
                    }
                    warn!(
                        "{what} failed, {} attempt(s) remaining: {e}",
                        attempts - attempt
                    );
                    attempt += 1;
                    if self.backoff_ms > 0 {
                        tokio::time::sleep(self.backoff()).await;
                    }
                }
                Err(e) => {
                    error!("Unexpected error during {what}: {e}");
                    return Err(e);
                }
            }
        }
    }
}
