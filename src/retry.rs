//! Sequential retry for fallible async operations
//!
//! Attempts run back to back with no delay between them. Every failed
//! attempt is logged at error level with its attempt number; the error of
//! the last attempt is returned to the caller.
//!
//! # Example
//!
//! ```no_run
//! use api_pipeline::retry::retry_sequential;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let body = retry_sequential(3, "API fetch", |_attempt| async {
//!     Ok::<_, std::io::Error>("payload".to_string())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use std::fmt::Display;
use std::future::Future;

/// Run `operation` up to `max_attempts` times until it succeeds
///
/// `operation` receives the 1-based attempt number. A `max_attempts` of zero
/// is treated as one.
///
/// # Returns
///
/// The first successful result, or the error of the final attempt.
pub async fn retry_sequential<F, Fut, T, E>(
    max_attempts: u32,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    attempt,
                    max_attempts,
                    "{} failed (attempt {}/{})",
                    label,
                    attempt,
                    max_attempts
                );

                if attempt >= max_attempts {
                    return Err(e);
                }
                attempt += 1;
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::capture_logs;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError;

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "transient error")
        }
    }

    #[tokio::test]
    async fn test_success_no_retry() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_sequential(3, "op", |_| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1, "should only call once");
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds() {
        let logs = capture_logs();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_sequential(3, "op", |_| {
            let counter = counter_clone.clone();
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 { Err(TestError) } else { Ok(42) }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(
            logs.count_containing("failed (attempt"),
            2,
            "one log line per failed attempt"
        );
        assert!(logs.contents().contains("op failed (attempt 2/3)"));
    }

    #[tokio::test]
    async fn test_exhausted_after_exact_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_sequential(3, "op", |_| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError)
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3, "exactly three attempts");
    }

    #[tokio::test]
    async fn test_attempt_numbers_are_one_based() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let _ = retry_sequential(4, "op", |attempt| {
            let seen = seen_clone.clone();
            async move {
                seen.lock().unwrap().push(attempt);
                Err::<(), _>(TestError)
            }
        })
        .await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_sequential(0, "op", |_| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError)
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_are_immediate() {
        let start = std::time::Instant::now();

        let _ = retry_sequential(5, "op", |_| async { Err::<(), _>(TestError) }).await;

        assert!(
            start.elapsed() < std::time::Duration::from_millis(500),
            "no backoff between attempts, took {:?}",
            start.elapsed()
        );
    }
}
