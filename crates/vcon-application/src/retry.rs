//! Jittered-backoff retry for retryable storage errors.
//!
//! Only transient storage failures (connection resets, serialization
//! conflicts) are retried. Validation, conflict and hook errors surface
//! immediately; search timeouts are left to the caller's discretion.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use vcon_domain::constants::{STORAGE_RETRY_BACKOFF_MS, STORAGE_RETRY_COUNT};
use vcon_domain::error::{Error, Result};

/// Run `operation`, retrying transient storage errors with doubled,
/// jittered backoff up to [`STORAGE_RETRY_COUNT`] attempts total.
pub async fn with_storage_retries<T, F, Fut>(op_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0usize;
    loop {
        match operation().await {
            Err(error) if is_transient(&error) && attempt + 1 < STORAGE_RETRY_COUNT => {
                attempt += 1;
                let backoff = backoff_for(attempt);
                warn!(
                    operation = op_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "transient storage error, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            other => return other,
        }
    }
}

fn is_transient(error: &Error) -> bool {
    matches!(
        error,
        Error::Storage {
            retryable: true,
            ..
        }
    )
}

fn backoff_for(attempt: usize) -> Duration {
    let base = STORAGE_RETRY_BACKOFF_MS << (attempt - 1).min(4);
    let jitter = rand::rng().random_range(0..=base / 2);
    Duration::from_millis(base + jitter)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicUsize::new(0);
        let result = with_storage_retries("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::storage_retryable("connection reset"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_validation_errors() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = with_storage_retries("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::validation("uuid", "bad")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_budget() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = with_storage_retries("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::storage_retryable("still down")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), STORAGE_RETRY_COUNT);
    }
}
