//! Result and error types for the invoice harness.

use thiserror::Error;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while driving the invoicing app or its API
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A required environment variable is absent or empty
    #[error("Missing required environment variable for {name}. Check .env configuration.")]
    MissingConfiguration {
        /// Logical key name (e.g. `apiAuth`)
        name: String,
    },

    /// Environment was present but could not be interpreted
    #[error("Invalid configuration: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Test preconditions are not met; the test is reported as skipped
    #[error("Skipped: {reason}")]
    Skipped {
        /// Why the test did not run
        reason: String,
    },

    /// Operation called in the wrong lifecycle state
    #[error("{message}")]
    IllegalState {
        /// Error message
        message: String,
    },

    /// A retrying expectation never held within its budget
    #[error("Timed out after {timeout_ms}ms waiting for {description}: {last}")]
    AssertionTimeout {
        /// What was being awaited
        description: String,
        /// Budget that elapsed
        timeout_ms: u64,
        /// Last observed failure
        last: String,
    },

    /// An element action needed exactly one match and got another count
    #[error("Locator {locator} resolved to {count} elements")]
    AmbiguousOrMissingElement {
        /// Locator description
        locator: String,
        /// Number of matches observed
        count: usize,
    },

    /// Assertion failed outright (no retry involved)
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Browser executable not found or failed to start
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page-level protocol error
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// HTTP transport error from the API client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Shorthand for a skip with the given reason
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Shorthand for an outright assertion failure
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Whether this error marks a skip rather than a failure
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// Whether a retry of the whole test could plausibly succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Skipped { .. } | Self::MissingConfiguration { .. } | Self::Config { .. }
        )
    }
}
