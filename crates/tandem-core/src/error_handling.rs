//! Retry logic for provider calls.
//!
//! Errors are classified as recoverable (rate limits, network trouble,
//! server errors, overloaded models, timeouts) or not. Recoverable errors
//! are retried with exponential backoff and jitter; everything else fails
//! immediately.

use anyhow::Result;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Base delay for exponential backoff (in milliseconds)
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Maximum delay between retries (in milliseconds)
const MAX_RETRY_DELAY_MS: u64 = 10000;

const JITTER_FACTOR: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorType {
    Recoverable(RecoverableError),
    NonRecoverable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecoverableError {
    RateLimit,
    NetworkError,
    /// Server error (5xx)
    ServerError,
    ModelBusy,
    Timeout,
}

/// Classify an error as recoverable or non-recoverable
pub fn classify_error(error: &anyhow::Error) -> ErrorType {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("rate limit")
        || error_str.contains("rate_limit")
        || error_str.contains("429")
    {
        return ErrorType::Recoverable(RecoverableError::RateLimit);
    }

    if error_str.contains("network")
        || error_str.contains("connection")
        || error_str.contains("dns")
        || error_str.contains("refused")
    {
        return ErrorType::Recoverable(RecoverableError::NetworkError);
    }

    if error_str.contains("500")
        || error_str.contains("502")
        || error_str.contains("503")
        || error_str.contains("504")
        || error_str.contains("server error")
        || error_str.contains("internal error")
    {
        return ErrorType::Recoverable(RecoverableError::ServerError);
    }

    if error_str.contains("busy")
        || error_str.contains("overloaded")
        || error_str.contains("capacity")
        || error_str.contains("unavailable")
    {
        return ErrorType::Recoverable(RecoverableError::ModelBusy);
    }

    if error_str.contains("timeout") || error_str.contains("timed out") {
        return ErrorType::Recoverable(RecoverableError::Timeout);
    }

    ErrorType::NonRecoverable
}

/// Calculate retry delay with exponential backoff and jitter
pub fn calculate_retry_delay(attempt: u32) -> Duration {
    use rand::Rng;

    // delay = base * 2^(attempt - 1)
    let base_delay = BASE_RETRY_DELAY_MS.saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)));
    let capped_delay = base_delay.min(MAX_RETRY_DELAY_MS);

    let mut rng = rand::thread_rng();
    let jitter = (capped_delay as f64 * JITTER_FACTOR * rng.gen::<f64>()) as u64;
    let final_delay = if rng.gen_bool(0.5) {
        capped_delay + jitter
    } else {
        capped_delay.saturating_sub(jitter)
    };

    Duration::from_millis(final_delay)
}

/// Run `operation` until it succeeds, fails with a non-recoverable error,
/// or `max_attempts` is reached.
pub async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    mut operation: F,
    max_attempts: u32,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        "Operation '{}' succeeded after {} attempts",
                        operation_name, attempt
                    );
                }
                return Ok(result);
            }
            Err(error) => match classify_error(&error) {
                ErrorType::Recoverable(recoverable_type) => {
                    if attempt >= max_attempts {
                        error!(
                            "Operation '{}' failed after {} attempts. Giving up: {}",
                            operation_name, attempt, error
                        );
                        return Err(error);
                    }

                    let delay = calculate_retry_delay(attempt);
                    warn!(
                        "Recoverable error ({:?}) in '{}' (attempt {}/{}). Retrying in {:?}...",
                        recoverable_type, operation_name, attempt, max_attempts, delay
                    );
                    warn!("Error details: {}", truncate_for_logging(&error.to_string(), 500));
                    tokio::time::sleep(delay).await;
                }
                ErrorType::NonRecoverable => {
                    error!(
                        "Non-recoverable error in '{}' (attempt {}): {}",
                        operation_name, attempt, error
                    );
                    return Err(error);
                }
            },
        }
    }
}

/// Truncate on a UTF-8 boundary for log output.
pub fn truncate_for_logging(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let mut truncate_at = max_len;
    while truncate_at > 0 && !s.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }

    format!("{}... (truncated, {} total bytes)", &s[..truncate_at], s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_classification() {
        let cases = [
            ("HTTP 429 Too Many Requests", ErrorType::Recoverable(RecoverableError::RateLimit)),
            ("connection reset by peer", ErrorType::Recoverable(RecoverableError::NetworkError)),
            ("OpenAI API error 503", ErrorType::Recoverable(RecoverableError::ServerError)),
            ("model is overloaded", ErrorType::Recoverable(RecoverableError::ModelBusy)),
            ("request timed out", ErrorType::Recoverable(RecoverableError::Timeout)),
            ("401 Unauthorized: invalid api key", ErrorType::NonRecoverable),
        ];

        for (message, expected) in cases {
            assert_eq!(classify_error(&anyhow::anyhow!(message)), expected, "{}", message);
        }
    }

    #[test]
    fn test_retry_delay_is_capped() {
        for attempt in 1..10 {
            let delay = calculate_retry_delay(attempt);
            assert!(delay <= Duration::from_millis((MAX_RETRY_DELAY_MS as f64 * 1.3) as u64));
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let truncated = truncate_for_logging(s, 2);
        assert!(truncated.starts_with('h'));
        assert!(truncated.contains("truncated"));
        assert_eq!(truncate_for_logging("short", 10), "short");
    }

    #[tokio::test]
    async fn test_non_recoverable_error_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(
            "test",
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow::anyhow!("invalid api key")) }
            },
            3,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recoverable_error_is_retried() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff(
            "test",
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(anyhow::anyhow!("503 service unavailable"))
                    } else {
                        Ok(n)
                    }
                }
            },
            3,
        )
        .await
        .unwrap();

        assert_eq!(result, 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
