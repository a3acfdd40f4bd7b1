//! Per-test fixtures with lazy page-object injection.
//!
//! A [`Fixtures`] value is created for every test attempt over that attempt's
//! isolated [`Session`]. Page objects are built on first request and reused
//! for the rest of the attempt; a test that never asks for the invoices page
//! never builds one. Nothing is shared between attempts.
//!
//! ```ignore
//! let outcome = UiTest::new("logout works", config)
//!     .run(&browser, |fx| async move {
//!         login(&fx).await?;
//!         fx.invoices_page().logout().await?;
//!         expect(&fx.access_code_page().code_input()).to_be_visible().await
//!     })
//!     .await;
//! ```

use crate::env::{EnvConfig, EnvKey};
use crate::pages::{AccessCodePage, DashboardPage, InvoicesPage};
use crate::result::{HarnessError, HarnessResult};
use crate::session::Session;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

/// Reason reported when the UI login has no access code to use
pub const LOGIN_SKIP_REASON: &str = "WEB_ACCESS_CODE is not configured for access code login.";

/// Something a test can ask [`Fixtures`] for by type.
///
/// Implementors are built from the attempt's session and the configuration
/// snapshot; they must not outlive the attempt.
pub trait Fixture: Any + Send + Sync {
    /// Build the fixture for one test attempt
    fn build(session: &Session, config: &EnvConfig) -> Self
    where
        Self: Sized;

    /// Get the fixture name for logging/debugging.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl Fixture for AccessCodePage {
    fn build(session: &Session, _config: &EnvConfig) -> Self {
        Self::new(session.clone())
    }
}

impl Fixture for DashboardPage {
    fn build(session: &Session, _config: &EnvConfig) -> Self {
        Self::new(session.clone())
    }
}

impl Fixture for InvoicesPage {
    fn build(session: &Session, config: &EnvConfig) -> Self {
        Self::new(session.clone(), config.search_settle())
    }
}

type Built = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

struct FixturesInner {
    session: Session,
    config: Arc<EnvConfig>,
    built: Mutex<Built>,
    torn_down: AtomicBool,
}

/// Lazily built, session-scoped fixtures for one test attempt
#[derive(Clone)]
pub struct Fixtures {
    inner: Arc<FixturesInner>,
}

impl fmt::Debug for Fixtures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixtures")
            .field("constructed", &self.built().len())
            .field("torn_down", &self.inner.torn_down.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Fixtures {
    #[must_use]
    pub fn new(session: Session, config: Arc<EnvConfig>) -> Self {
        Self {
            inner: Arc::new(FixturesInner {
                session,
                config,
                built: Mutex::new(HashMap::new()),
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    fn built(&self) -> MutexGuard<'_, Built> {
        // The map only ever holds finished entries, so a poisoned lock is
        // still consistent.
        self.inner
            .built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The fixture of type `F`, built on first request
    ///
    /// Whatever is returned is also the registered instance, so later calls
    /// see the same value.
    pub fn get<F: Fixture>(&self) -> Arc<F> {
        let key = TypeId::of::<F>();
        let mut built = self.built();
        if let Some(existing) = built.get(&key) {
            match Arc::clone(existing).downcast::<F>() {
                Ok(fixture) => return fixture,
                Err(_) => error!(
                    "Fixture slot for {} held another type; replacing it",
                    std::any::type_name::<F>()
                ),
            }
        }
        let fixture = Arc::new(F::build(&self.inner.session, &self.inner.config));
        debug!("Constructed fixture {}", fixture.name());
        built.insert(key, Arc::clone(&fixture) as Arc<dyn Any + Send + Sync>);
        fixture
    }

    /// Whether `F` has been requested during this attempt
    #[must_use]
    pub fn is_constructed<F: Fixture>(&self) -> bool {
        self.built().contains_key(&TypeId::of::<F>())
    }

    /// Number of fixtures built so far
    #[must_use]
    pub fn constructed_count(&self) -> usize {
        self.built().len()
    }

    pub fn access_code_page(&self) -> Arc<AccessCodePage> {
        self.get()
    }

    pub fn dashboard_page(&self) -> Arc<DashboardPage> {
        self.get()
    }

    pub fn invoices_page(&self) -> Arc<InvoicesPage> {
        self.get()
    }

    /// Raw access to the attempt's session
    pub fn page(&self) -> &Session {
        &self.inner.session
    }

    pub fn config(&self) -> &EnvConfig {
        &self.inner.config
    }

    /// Drop every fixture and close the session. Only the first call does
    /// anything.
    pub async fn teardown(&self) -> HarnessResult<()> {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let dropped = {
            let mut built = self.built();
            let count = built.len();
            built.clear();
            count
        };
        debug!("Tearing down {} fixture(s)", dropped);
        self.inner.session.close().await
    }
}

/// Log in through the access-code gate with the configured code.
///
/// Returns [`HarnessError::Skipped`] when no code is configured so the
/// calling test is reported as skipped rather than failed.
pub async fn login(fixtures: &Fixtures) -> HarnessResult<()> {
    let Some(code) = fixtures.config().get(EnvKey::WebAccessCode) else {
        info!("{}", LOGIN_SKIP_REASON);
        return Err(HarnessError::skipped(LOGIN_SKIP_REASON));
    };
    fixtures.access_code_page().login(code).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::assertion::expect;
    use crate::mock::app;
    use crate::page_object::PageObject;

    mod injection_tests {
        use super::*;

        #[tokio::test]
        async fn test_construction_is_lazy() {
            let fixtures = app::fixtures();
            assert_eq!(fixtures.constructed_count(), 0);
            let _ = fixtures.access_code_page();
            assert!(fixtures.is_constructed::<AccessCodePage>());
            assert!(!fixtures.is_constructed::<InvoicesPage>());
            assert_eq!(fixtures.constructed_count(), 1);
        }

        #[tokio::test]
        async fn test_same_instance_within_attempt() {
            let fixtures = app::fixtures();
            let a = fixtures.invoices_page();
            let b = fixtures.invoices_page();
            assert!(Arc::ptr_eq(&a, &b));
            assert_eq!(a.settle(), fixtures.config().search_settle());
        }

        #[tokio::test]
        async fn test_mismatched_slot_is_replaced_by_registered_instance() {
            let fixtures = app::fixtures();
            fixtures
                .built()
                .insert(TypeId::of::<DashboardPage>(), Arc::new(7_u32));

            let rebuilt = fixtures.dashboard_page();
            assert!(Arc::ptr_eq(&rebuilt, &fixtures.dashboard_page()));
            assert_eq!(fixtures.constructed_count(), 1);
        }

        #[tokio::test]
        async fn test_attempts_do_not_share_fixtures() {
            let first = app::fixtures();
            let second = app::fixtures();
            assert!(!Arc::ptr_eq(&first.dashboard_page(), &second.dashboard_page()));
        }

        #[tokio::test]
        async fn test_teardown_closes_session_once() {
            let (fixtures, driver) = app::fixtures_with_driver();
            let _ = fixtures.dashboard_page();
            fixtures.teardown().await.unwrap();
            assert!(driver.is_closed());
            assert_eq!(fixtures.constructed_count(), 0);
            fixtures.teardown().await.unwrap();
            let closes = driver.history().iter().filter(|c| *c == "close").count();
            assert_eq!(closes, 1);
        }
    }

    mod login_tests {
        use super::*;

        #[tokio::test]
        async fn test_login_skips_without_code() {
            let (session, driver) = app::session();
            let config = EnvConfig::from_vars(vec![("WEB_BASE_URL", app::BASE_URL)]).unwrap();
            let fixtures = Fixtures::new(session, Arc::new(config));
            let err = login(&fixtures).await.unwrap_err();
            assert!(err.is_skip());
            assert_eq!(err.to_string(), format!("Skipped: {LOGIN_SKIP_REASON}"));
            assert!(!driver.was_called("goto"));
        }

        #[tokio::test]
        async fn test_login_reaches_invoices() {
            let fixtures = app::fixtures();
            login(&fixtures).await.unwrap();
            fixtures.invoices_page().expect_loaded().await.unwrap();
            expect(&fixtures.access_code_page().code_input())
                .to_be_hidden()
                .await
                .unwrap();
            assert!(fixtures.access_code_page().page_name().contains("AccessCode"));
        }
    }
}
