//! Test runner: per-attempt sessions, retries, timeouts, serial suites.
//!
//! [`UiTest`] wraps one UI scenario. Every attempt gets a fresh session from
//! the [`SessionLauncher`] and a fresh [`Fixtures`]; the session is torn down
//! whatever the attempt's outcome. A [`HarnessError::Skipped`] from the body
//! ends the test as skipped. Whole-test retries follow the configuration
//! (two under CI, none locally); individual operations are never retried
//! here.
//!
//! [`Suite`] records the ordered steps of a serial suite whose steps share
//! state (the API CRUD chain), so a step can be skipped when an earlier one
//! did not produce what it needs.

use crate::env::EnvConfig;
use crate::fixture::Fixtures;
use crate::result::{HarnessError, HarnessResult};
use crate::session::SessionLauncher;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

/// Lock shared by the tests of a suite that must not run concurrently
#[derive(Debug)]
pub struct SerialGroup {
    name: &'static str,
    lock: Mutex<()>,
}

impl SerialGroup {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            lock: Mutex::const_new(()),
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

/// Final result of a test
#[derive(Debug)]
pub enum TestOutcome {
    /// Body succeeded on attempt `attempts`
    Passed {
        attempts: u32,
        duration: Duration,
    },
    /// Body asked to be skipped
    Skipped { reason: String },
    /// Every allowed attempt failed; `error` is the last failure
    Failed {
        attempts: u32,
        error: HarnessError,
    },
}

impl TestOutcome {
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// `Ok` for passed and skipped tests, the last error otherwise
    pub fn into_result(self) -> HarnessResult<()> {
        match self {
            Self::Passed { .. } | Self::Skipped { .. } => Ok(()),
            Self::Failed { error, .. } => Err(error),
        }
    }

    /// Like [`into_result`](Self::into_result) after a cleanup step such as
    /// closing the browser. A cleanup error is logged and never replaces the
    /// test's own result.
    pub fn after_cleanup(self, cleanup: HarnessResult<()>) -> HarnessResult<()> {
        if let Err(e) = cleanup {
            warn!("Cleanup after test failed: {}", e);
        }
        self.into_result()
    }
}

/// One UI scenario
#[derive(Debug, Clone)]
pub struct UiTest {
    name: String,
    config: Arc<EnvConfig>,
    retries: u32,
    timeout: Duration,
    serial: Option<&'static SerialGroup>,
}

impl UiTest {
    /// Test with retry count and timeout taken from `config`
    #[must_use]
    pub fn new(name: impl Into<String>, config: Arc<EnvConfig>) -> Self {
        Self {
            name: name.into(),
            retries: config.retries(),
            timeout: config.test_timeout(),
            config,
            serial: None,
        }
    }

    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run under `group`'s lock
    #[must_use]
    pub const fn serial(mut self, group: &'static SerialGroup) -> Self {
        self.serial = Some(group);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `body` until it passes, skips, or runs out of attempts
    pub async fn run<L, F, Fut>(&self, launcher: &L, body: F) -> TestOutcome
    where
        L: SessionLauncher + ?Sized,
        F: Fn(Fixtures) -> Fut,
        Fut: Future<Output = HarnessResult<()>>,
    {
        let _serial = match self.serial {
            Some(group) => Some(group.acquire().await),
            None => None,
        };
        let start = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.attempt(launcher, &body).await {
                Ok(()) => {
                    info!("✓ {} ({} attempt(s))", self.name, attempts);
                    return TestOutcome::Passed {
                        attempts,
                        duration: start.elapsed(),
                    };
                }
                Err(HarnessError::Skipped { reason }) => {
                    info!("- {} skipped: {}", self.name, reason);
                    return TestOutcome::Skipped { reason };
                }
                Err(e) if e.is_retryable() && attempts <= self.retries => {
                    warn!("{} failed on attempt {}, retrying: {}", self.name, attempts, e);
                }
                Err(e) => {
                    error!("✗ {}: {}", self.name, e);
                    return TestOutcome::Failed { attempts, error: e };
                }
            }
        }
    }

    async fn attempt<L, F, Fut>(&self, launcher: &L, body: &F) -> HarnessResult<()>
    where
        L: SessionLauncher + ?Sized,
        F: Fn(Fixtures) -> Fut,
        Fut: Future<Output = HarnessResult<()>>,
    {
        let session = launcher.launch(&self.config).await?;
        let fixtures = Fixtures::new(session, Arc::clone(&self.config));
        let outcome = tokio::time::timeout(self.timeout, body(fixtures.clone()))
            .await
            .unwrap_or_else(|_| {
                Err(HarnessError::AssertionTimeout {
                    description: format!("test {:?}", self.name),
                    timeout_ms: self.timeout.as_millis() as u64,
                    last: "test body did not finish".to_string(),
                })
            });
        if let Err(e) = fixtures.teardown().await {
            warn!("Teardown of {} failed: {}", self.name, e);
        }
        outcome
    }
}

/// Status of one suite step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    Skipped(String),
    Failed(String),
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

/// Recorded step
#[derive(Debug, Clone)]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
    pub duration: Duration,
}

/// Ordered steps of a serial suite
#[derive(Debug, Clone)]
pub struct Suite {
    name: String,
    steps: Vec<StepReport>,
}

impl Suite {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Run one step, recording its outcome. Returns the step's value when
    /// it passed.
    pub async fn step<T, Fut>(&mut self, name: &str, step: Fut) -> Option<T>
    where
        Fut: Future<Output = HarnessResult<T>>,
    {
        let start = Instant::now();
        let (status, value) = match step.await {
            Ok(value) => (StepStatus::Passed, Some(value)),
            Err(HarnessError::Skipped { reason }) => (StepStatus::Skipped(reason), None),
            Err(e) => (StepStatus::Failed(e.to_string()), None),
        };
        info!("{} › {}: {}", self.name, name, status);
        self.steps.push(StepReport {
            name: name.to_string(),
            status,
            duration: start.elapsed(),
        });
        value
    }

    /// Record a step that was not run
    pub fn skip(&mut self, name: &str, reason: impl Into<String>) {
        let status = StepStatus::Skipped(reason.into());
        info!("{} › {}: {}", self.name, name, status);
        self.steps.push(StepReport {
            name: name.to_string(),
            status,
            duration: Duration::ZERO,
        });
    }

    #[must_use]
    pub fn steps(&self) -> &[StepReport] {
        &self.steps
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(|s| matches!(s, StepStatus::Passed))
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(|s| matches!(s, StepStatus::Skipped(_)))
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, StepStatus::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&StepStatus) -> bool) -> usize {
        self.steps.iter().filter(|s| pred(&s.status)).count()
    }

    /// One line per step
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{}: {} passed, {} skipped, {} failed",
            self.name,
            self.passed_count(),
            self.skipped_count(),
            self.failed_count()
        );
        for step in &self.steps {
            out.push_str(&format!("\n  {} {}", step.name, step.status));
        }
        out
    }

    /// Fail if any step failed
    pub fn finish(self) -> HarnessResult<()> {
        if self.failed_count() == 0 {
            Ok(())
        } else {
            Err(HarnessError::assertion(self.summary()))
        }
    }
}
