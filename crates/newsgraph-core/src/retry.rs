use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::Result;

/// Exponential backoff with full jitter, applied as a plain combinator at
/// the call site rather than a decorator on the client — the spec calls for
/// retry to be visible at the point it matters (LLM and directory calls),
/// not hidden behind an annotation. Shared by `newsgraph-llm` and
/// `newsgraph-directory`, the two crates that make upstream calls.
///
/// Only `CoreError::is_retryable()` errors are retried; anything else (a
/// validation failure, an upstream-permanent rejection) returns immediately.
///
/// `max_wait` caps the computed delay (spec.md §6 `MAX_WAIT_SECONDS`) so a
/// long run of retries can't back off past the caller's patience.
pub async fn with_backoff<T, F, Fut>(
    operation_name: &str,
    max_retries: u32,
    max_wait: Duration,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_retries => {
                let base_ms = 250u64 * 2u64.pow(attempt);
                let jitter_ms = rand::rng().random_range(0..=base_ms / 2);
                let delay = Duration::from_millis(base_ms + jitter_ms).min(max_wait);
                warn!(
                    operation = operation_name,
                    attempt,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    support_code = err.support_code(),
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("test", 3, Duration::from_secs(60), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, CoreError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_up_to_the_bound() {
        let calls = AtomicU32::new(0);
        let result: Result<i32> = with_backoff("test", 2, Duration::from_secs(60), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CoreError::llm_transient("timeout"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<i32> = with_backoff("test", 1, Duration::from_secs(60), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CoreError::llm_transient("still down")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn never_retries_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<i32> = with_backoff("test", 5, Duration::from_secs(60), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CoreError::llm_permanent("bad api key")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
