//! Environment configuration.
//!
//! The harness reads its settings once per process: an optional `.env` file
//! is loaded first, then the process environment is deserialised into a
//! [`RawConfig`] and validated into an immutable [`EnvConfig`]. Components
//! receive the snapshot by reference (`Arc<EnvConfig>`); tests build their
//! own snapshot with [`EnvConfig::from_vars`].

use crate::result::{HarnessError, HarnessResult};
use serde::Deserialize;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info};

/// Base URL used when `WEB_BASE_URL` is absent
pub const DEFAULT_WEB_BASE_URL: &str = "https://candidates-qa.contalink.com/";

/// Default whole-test budget in milliseconds
pub const DEFAULT_TEST_TIMEOUT_MS: u64 = 60_000;

/// Default budget of a retrying expectation in milliseconds
pub const DEFAULT_EXPECT_TIMEOUT_MS: u64 = 10_000;

/// Default budget of a locator action (click, fill, ...) in milliseconds
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 5_000;

/// Default settle period after search / clear-filters clicks
pub const DEFAULT_SEARCH_SETTLE_MS: u64 = 3_000;

/// Whole-test retries when running under CI
pub const CI_RETRIES: u32 = 2;

/// Logical configuration keys exposed to the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvKey {
    /// Root of the web application
    WebBaseUrl,
    /// Access code accepted by the gate screen
    WebAccessCode,
    /// Root of the invoicing REST API
    ApiBaseUrl,
    /// Value sent verbatim as the `Authorization` header
    ApiAuth,
}

impl EnvKey {
    /// Environment variable backing this key
    #[must_use]
    pub const fn var_name(self) -> &'static str {
        match self {
            Self::WebBaseUrl => "WEB_BASE_URL",
            Self::WebAccessCode => "WEB_ACCESS_CODE",
            Self::ApiBaseUrl => "API_BASE_URL",
            Self::ApiAuth => "API_AUTH",
        }
    }

    /// Logical name used in error messages
    #[must_use]
    pub const fn logical_name(self) -> &'static str {
        match self {
            Self::WebBaseUrl => "webBaseUrl",
            Self::WebAccessCode => "webAccessCode",
            Self::ApiBaseUrl => "apiBaseUrl",
            Self::ApiAuth => "apiAuth",
        }
    }
}

impl fmt::Display for EnvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.logical_name())
    }
}

/// Environment as deserialised, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    web_base_url: Option<String>,
    web_access_code: Option<String>,
    api_base_url: Option<String>,
    api_auth: Option<String>,
    ci: Option<String>,
    headless: Option<String>,
    chromium_path: Option<String>,
    test_timeout_ms: Option<u64>,
    expect_timeout_ms: Option<u64>,
    action_timeout_ms: Option<u64>,
    search_settle_ms: Option<u64>,
}

/// Immutable configuration snapshot
#[derive(Debug, Clone)]
pub struct EnvConfig {
    web_base_url: String,
    web_access_code: Option<String>,
    api_base_url: Option<String>,
    api_auth: Option<String>,
    ci: bool,
    headless: bool,
    chromium_path: Option<String>,
    test_timeout: Duration,
    expect_timeout: Duration,
    action_timeout: Duration,
    search_settle: Duration,
}

static PROCESS_CONFIG: OnceLock<Arc<EnvConfig>> = OnceLock::new();

/// Process-wide snapshot, built on first use.
///
/// Loads `.env` (if any) before reading the environment. Later calls return
/// the same snapshot even if the environment has changed since.
pub fn config() -> HarnessResult<Arc<EnvConfig>> {
    if let Some(config) = PROCESS_CONFIG.get() {
        return Ok(Arc::clone(config));
    }

    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment overrides from {}", path.display()),
        Err(e) if e.not_found() => debug!("No .env file found, using process environment"),
        Err(e) => {
            return Err(HarnessError::Config {
                message: format!("failed to load .env: {e}"),
            })
        }
    }

    let built = Arc::new(EnvConfig::from_vars(std::env::vars())?);
    // A concurrent first caller may have won the race; hand out the winner.
    let _ = PROCESS_CONFIG.set(Arc::clone(&built));
    Ok(PROCESS_CONFIG.get().map_or(built, Arc::clone))
}

/// Resolve a required key from the process-wide snapshot
pub fn require_env(key: EnvKey) -> HarnessResult<String> {
    config()?.require(key).map(str::to_string)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_flag(name: &str, value: &str) -> HarnessResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(HarnessError::Config {
            message: format!("{name} must be a boolean, got {other:?}"),
        }),
    }
}

impl EnvConfig {
    /// Build a snapshot from explicit key/value pairs.
    pub fn from_vars<I, S>(vars: I) -> HarnessResult<Self>
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let raw: RawConfig = serde_env::from_iter(vars).map_err(|e| HarnessError::Config {
            message: e.to_string(),
        })?;
        Self::from_raw(raw)
    }

    /// Validate a raw snapshot, applying defaults.
    pub fn from_raw(raw: RawConfig) -> HarnessResult<Self> {
        let RawConfig {
            web_base_url,
            web_access_code,
            api_base_url,
            api_auth,
            ci,
            headless,
            chromium_path,
            test_timeout_ms,
            expect_timeout_ms,
            action_timeout_ms,
            search_settle_ms,
        } = raw;

        let web_base_url = match non_empty(web_base_url) {
            Some(url) => url,
            None => {
                debug!("WEB_BASE_URL not set, defaulting to {}", DEFAULT_WEB_BASE_URL);
                DEFAULT_WEB_BASE_URL.to_string()
            }
        };

        let headless = match non_empty(headless) {
            Some(v) => parse_flag("HEADLESS", &v)?,
            None => true,
        };

        let ci = non_empty(ci).is_some();
        if ci {
            info!("CI detected, enabling {} whole-test retries", CI_RETRIES);
        }

        Ok(Self {
            web_base_url,
            web_access_code: non_empty(web_access_code),
            api_base_url: non_empty(api_base_url),
            api_auth: non_empty(api_auth),
            ci,
            headless,
            chromium_path: non_empty(chromium_path),
            test_timeout: Duration::from_millis(test_timeout_ms.unwrap_or(DEFAULT_TEST_TIMEOUT_MS)),
            expect_timeout: Duration::from_millis(
                expect_timeout_ms.unwrap_or(DEFAULT_EXPECT_TIMEOUT_MS),
            ),
            action_timeout: Duration::from_millis(
                action_timeout_ms.unwrap_or(DEFAULT_ACTION_TIMEOUT_MS),
            ),
            search_settle: Duration::from_millis(
                search_settle_ms.unwrap_or(DEFAULT_SEARCH_SETTLE_MS),
            ),
        })
    }

    /// Value of a key, `None` when absent or empty
    #[must_use]
    pub fn get(&self, key: EnvKey) -> Option<&str> {
        match key {
            EnvKey::WebBaseUrl => Some(self.web_base_url.as_str()),
            EnvKey::WebAccessCode => self.web_access_code.as_deref(),
            EnvKey::ApiBaseUrl => self.api_base_url.as_deref(),
            EnvKey::ApiAuth => self.api_auth.as_deref(),
        }
    }

    /// Value of a key, or `MissingConfiguration` naming it. Never empty.
    pub fn require(&self, key: EnvKey) -> HarnessResult<&str> {
        self.get(key)
            .ok_or_else(|| HarnessError::MissingConfiguration {
                name: key.logical_name().to_string(),
            })
    }

    pub fn web_base_url(&self) -> &str {
        &self.web_base_url
    }

    pub fn is_ci(&self) -> bool {
        self.ci
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn chromium_path(&self) -> Option<&str> {
        self.chromium_path.as_deref()
    }

    /// Whole-test retries: two under CI, none locally
    pub fn retries(&self) -> u32 {
        if self.ci {
            CI_RETRIES
        } else {
            0
        }
    }

    pub fn test_timeout(&self) -> Duration {
        self.test_timeout
    }

    pub fn expect_timeout(&self) -> Duration {
        self.expect_timeout
    }

    pub fn action_timeout(&self) -> Duration {
        self.action_timeout
    }

    pub fn search_settle(&self) -> Duration {
        self.search_settle
    }
}
