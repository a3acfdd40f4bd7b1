//! Retry loop with polling for eventually-consistent UI state.
//!
//! Every locator action and every expectation funnels through
//! [`retry_until`]: the check is re-run on a fixed interval until it passes
//! or the budget is spent. Driver errors raised by a check (a page that is
//! mid-navigation, say) count as a failed attempt, not as a fatal error.

use crate::result::{HarnessError, HarnessResult};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Result of a single check
#[derive(Debug, Clone)]
pub enum AssertionCheckResult<T = ()> {
    /// Check passed, carrying whatever it resolved
    Pass(T),
    /// Check failed with message
    Fail(String),
}

impl<T> AssertionCheckResult<T> {
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass(_))
    }

    /// Turn a boolean into a check result
    pub fn from_bool(ok: bool, value: T, message: impl FnOnce() -> String) -> Self {
        if ok {
            Self::Pass(value)
        } else {
            Self::Fail(message())
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total timeout duration
    pub timeout: Duration,
    /// Interval between attempts
    pub poll_interval: Duration,
    /// Maximum number of attempts (0 = unlimited within timeout)
    pub max_retries: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_retries: 0,
        }
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_max_retries(mut self, max: usize) -> Self {
        self.max_retries = max;
        self
    }
}

/// Stats of a successful retry loop
#[derive(Debug, Clone, Copy)]
pub struct RetryResult {
    /// Number of attempts before success
    pub attempts: usize,
    /// Total duration of all attempts
    pub duration: Duration,
}

/// Retry loop gave up
#[derive(Debug, Clone)]
pub struct RetryError {
    /// Last failure message
    pub message: String,
    /// Number of attempts made
    pub attempts: usize,
    /// Budget that was configured
    pub timeout: Duration,
    /// What was being awaited
    pub description: String,
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: failed after {} attempt(s) ({:.2}s): {}",
            self.description,
            self.attempts,
            self.timeout.as_secs_f64(),
            self.message
        )
    }
}

impl std::error::Error for RetryError {}

impl From<RetryError> for HarnessError {
    fn from(e: RetryError) -> Self {
        Self::AssertionTimeout {
            description: e.description,
            timeout_ms: e.timeout.as_millis() as u64,
            last: format!("{} (after {} attempt(s))", e.message, e.attempts),
        }
    }
}

/// Poll `check` until it passes or `config` is exhausted.
///
/// The check always runs at least once, even with a zero timeout.
pub async fn retry_until<T, F, Fut>(
    config: RetryConfig,
    description: impl Into<String>,
    mut check: F,
) -> Result<(T, RetryResult), RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<AssertionCheckResult<T>>>,
{
    let start = Instant::now();
    let mut attempts = 0;
    let mut last_error = String::new();

    loop {
        attempts += 1;

        match check().await {
            Ok(AssertionCheckResult::Pass(value)) => {
                return Ok((
                    value,
                    RetryResult {
                        attempts,
                        duration: start.elapsed(),
                    },
                ));
            }
            Ok(AssertionCheckResult::Fail(msg)) => last_error = msg,
            Err(e) => last_error = e.to_string(),
        }

        let out_of_time = start.elapsed() >= config.timeout;
        let out_of_attempts = config.max_retries > 0 && attempts >= config.max_retries;
        if out_of_time || out_of_attempts {
            return Err(RetryError {
                message: last_error,
                attempts,
                timeout: config.timeout,
                description: description.into(),
            });
        }

        tokio::time::sleep(config.poll_interval).await;
    }
}
