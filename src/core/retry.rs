//! Bounded retry with exponential backoff.
//!
//! Every call to the model service goes through [`retry_async`], so the
//! attempt cap and the delay schedule live in one policy object instead of
//! ad-hoc sleep loops at each call site.

use std::future::Future;
use std::time::{Duration, Instant};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one (minimum 1).
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub initial_delay: Duration,

    /// Maximum delay between attempts.
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (e.g., 2.0 = double each time).
    pub backoff_multiplier: f64,

    /// Whether to add up to 25% jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a config with a single attempt (fail fast).
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }

    /// Create a config that retries immediately (tests and local servers).
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    ///
    /// Attempt 1 waits `initial_delay`, attempt 2 waits
    /// `initial_delay * multiplier`, and so on, capped at `max_delay`.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            let jitter_factor = 1.0 + (rand_jitter() * 0.25);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }

    fn attempt_cap(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Pseudo-random jitter in `0.0..1.0` taken from the clock's sub-second nanos.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}

/// Result of a retry operation.
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The final result (success or last error).
    pub result: Result<T, E>,

    /// Number of attempts made.
    pub attempts: u32,

    /// Total time spent (including delays).
    pub total_time: Duration,

    /// Whether the last error was retryable and the cap was reached.
    pub exhausted: bool,
}

impl<T, E> RetryResult<T, E> {
    /// Check if the operation succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Whether more than one attempt was made.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Get the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Retry an async operation while `is_retryable` accepts its error.
///
/// Errors rejected by `is_retryable` are returned after the attempt that
/// produced them; retryable errors are retried until `max_attempts` is hit.
pub async fn retry_async<T, E, F, Fut, P>(
    config: &RetryConfig,
    is_retryable: P,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let max_attempts = config.attempt_cap();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let result = operation(attempts).await;

        let error = match result {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts,
                    total_time: start.elapsed(),
                    exhausted: false,
                };
            }
            Err(error) => error,
        };

        if !is_retryable(&error) {
            return RetryResult {
                result: Err(error),
                attempts,
                total_time: start.elapsed(),
                exhausted: false,
            };
        }

        if attempts >= max_attempts {
            tracing::warn!(attempts, error = %error, "Retry attempts exhausted");
            return RetryResult {
                result: Err(error),
                attempts,
                total_time: start.elapsed(),
                exhausted: true,
            };
        }

        let delay = config.delay_after_attempt(attempts);
        tracing::debug!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
