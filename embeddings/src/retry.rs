//! Bounded retry with exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EmbeddingError, Result};

/// How many times a transient failure is retried, and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,

    /// Delay before the first retry; doubled for every further attempt.
    pub base_delay_ms: u64,

    /// Longest single wait. A server asking for more than this fails the call.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Set the retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the longest single wait between attempts.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Backoff before retry number `attempt` (1-based), capped at 32x base.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(5);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1 << exponent))
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self.backoff(attempt);
                    let delay = match &err {
                        EmbeddingError::RateLimited { retry_after_secs } => {
                            let retry_after = Duration::from_secs(*retry_after_secs);
                            if retry_after > self.max_delay() {
                                warn!(
                                    "{what} rate limited for {retry_after_secs}s, longer than the {}ms retry limit",
                                    self.max_delay_ms
                                );
                                return Err(err);
                            }
                            retry_after.max(backoff)
                        }
                        _ => backoff,
                    }
                    .min(self.max_delay());
                    warn!(
                        "{what} failed ({err}); retry {attempt}/{} in {}ms",
                        self.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), Duration::from_millis(3200));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(1));

        let value = policy
            .run("embed", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(EmbeddingError::ApiRequest {
                        status: 502,
                        body: "bad gateway".to_string(),
                    })
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(1));

        let result: Result<()> = policy
            .run("embed", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EmbeddingError::InvalidResponse("no vectors".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_retry_after_fails_without_waiting() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy::default().with_max_delay(Duration::from_secs(30));
        let started = tokio::time::Instant::now();

        let result: Result<()> = policy
            .run("embed", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EmbeddingError::RateLimited {
                    retry_after_secs: 86_400,
                })
            })
            .await;

        assert!(matches!(
            result,
            Err(EmbeddingError::RateLimited {
                retry_after_secs: 86_400
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_retry_after_is_honoured() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(1));
        let started = tokio::time::Instant::now();

        let value = policy
            .run("embed", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(EmbeddingError::RateLimited {
                        retry_after_secs: 2,
                    })
                } else {
                    Ok("done")
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_clamped_to_max_delay() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy::default()
            .with_max_retries(1)
            .with_base_delay(Duration::from_secs(60))
            .with_max_delay(Duration::from_secs(5));
        let started = tokio::time::Instant::now();

        let result: Result<()> = policy
            .run("embed", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EmbeddingError::ApiRequest {
                    status: 503,
                    body: String::new(),
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(5), "{waited:?}");
        assert!(waited < Duration::from_secs(60), "{waited:?}");
    }

    #[test]
    fn test_max_delay_defaults_when_absent() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"max_retries": 1, "base_delay_ms": 10}"#).unwrap();
        assert_eq!(policy.max_delay_ms, 30_000);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy::default()
            .with_max_retries(3)
            .with_base_delay(Duration::from_millis(1));

        let result: Result<()> = policy
            .run("embed", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EmbeddingError::ApiRequest {
                    status: 500,
                    body: String::new(),
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
