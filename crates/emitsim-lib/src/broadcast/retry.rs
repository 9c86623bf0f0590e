//! Retry with exponential backoff for queue substrate calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Delay before retry number `attempt` (zero based), capped at the
/// configured maximum.
pub fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let multiplier = 2u64.saturating_pow(attempt.min(20));
    let delay_ms = config
        .base_delay_ms
        .saturating_mul(multiplier)
        .min(config.max_delay_ms);
    Duration::from_millis(delay_ms)
}

/// Run `op` until it succeeds or `max_attempts` calls have failed.
///
/// Exhaustion is reported as [`Error::SubstrateUnavailable`] carrying the
/// last failure.
pub async fn with_backoff<T, F, Fut>(queue: &str, config: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= attempts {
                    return Err(Error::SubstrateUnavailable {
                        queue: queue.to_string(),
                        attempts: attempt,
                        message: err.to_string(),
                    });
                }
                let delay = calculate_backoff(config, attempt - 1);
                warn!(queue, attempt, error = %err, ?delay, "queue substrate call failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 250,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = config();
        assert_eq!(calculate_backoff(&config, 0), Duration::from_millis(100));
        assert_eq!(calculate_backoff(&config, 1), Duration::from_millis(200));
        assert_eq!(calculate_backoff(&config, 2), Duration::from_millis(250));
        assert_eq!(calculate_backoff(&config, 64), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let value = with_backoff("q", &config(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::Io(std::io::Error::other("flaky")))
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_backoff("wire", &config(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Io(std::io::Error::other("down")))
        })
        .await;
        match result {
            Err(Error::SubstrateUnavailable { queue, attempts, message }) => {
                assert_eq!(queue, "wire");
                assert_eq!(attempts, 3);
                assert!(message.contains("down"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
