//! Retry utilities for transient remote failures.
//!
//! Provides classification of retryable errors, exponential backoff, and a
//! retry loop that also bounds every attempt with a timeout.

use crate::error::{StageError, StageResult};
use crate::types::Stage;
use std::future::Future;
use std::time::Duration;

/// Retry and timeout settings for one remote call.
#[derive(Debug, Clone, Copy)]
pub struct RetryOptions {
    /// Maximum retries after the first attempt
    pub attempts: u32,
    /// Base backoff delay in milliseconds
    pub delay_ms: u64,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            attempts: 2,
            delay_ms: 1000,
            timeout_ms: 120_000,
        }
    }
}

/// Determine whether a stage error is worth retrying.
///
/// Retryable errors: timeouts, unreachable services, rate limits (429),
/// server errors (5xx, which includes the Inference API's 503 while a model
/// is loading).
/// Non-retryable: auth failures, bad requests, missing credentials, parse errors.
pub fn is_retryable(error: &StageError) -> bool {
    match error {
        StageError::Timeout { .. } | StageError::Unreachable { .. } => true,
        StageError::Caption { status_code, .. }
        | StageError::Story { status_code, .. }
        | StageError::Speech { status_code, .. } => {
            matches!(status_code, Some(code) if *code == 429 || (500..=599).contains(code))
        }
        _ => false,
    }
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retries are exhausted. Each attempt is bounded by `options.timeout_ms`.
pub async fn run_with_retry<T, F, Fut>(
    stage: Stage,
    options: &RetryOptions,
    mut op: F,
) -> StageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StageResult<T>>,
{
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(Duration::from_millis(options.timeout_ms), op())
            .await
        {
            Ok(result) => result,
            Err(_) => Err(StageError::Timeout {
                stage,
                timeout_ms: options.timeout_ms,
            }),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt < options.attempts && is_retryable(&e) => {
                let delay = backoff_duration(attempt, options.delay_ms);
                attempt += 1;
                tracing::debug!(
                    "Retry {attempt}/{} for {stage} stage after {delay:?}: {e}",
                    options.attempts
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
