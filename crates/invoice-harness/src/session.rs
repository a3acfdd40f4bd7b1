//! Browsing session handle.
//!
//! A [`Session`] is what a test sees as "the page": one isolated driver plus
//! the base URL and timeout budgets from the environment. It is cheap to
//! clone; page objects and locators each hold a clone.

use crate::dialog::DialogWaiter;
use crate::driver::BrowserDriver;
use crate::env::EnvConfig;
use crate::locator::Locator;
use crate::result::{HarnessError, HarnessResult};
use crate::selector::{Selector, TextMatch};
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Timeout budgets applied to locators created from a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Auto-wait budget of actions (click, fill, ...)
    pub action: Duration,
    /// Budget of retrying expectations
    pub expect: Duration,
}

impl Timeouts {
    #[must_use]
    pub fn from_config(config: &EnvConfig) -> Self {
        Self {
            action: config.action_timeout(),
            expect: config.expect_timeout(),
        }
    }
}

/// One isolated browsing session
#[derive(Debug, Clone)]
pub struct Session {
    driver: Arc<dyn BrowserDriver>,
    base_url: String,
    timeouts: Timeouts,
}

impl Session {
    #[must_use]
    pub fn new(driver: Arc<dyn BrowserDriver>, config: &EnvConfig) -> Self {
        Self {
            driver,
            base_url: config.web_base_url().to_string(),
            timeouts: Timeouts::from_config(config),
        }
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Raw driver access
    pub fn driver(&self) -> &Arc<dyn BrowserDriver> {
        &self.driver
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Resolve `path` against the base URL. Absolute URLs pass through.
    pub fn resolve_url(&self, path: &str) -> HarnessResult<String> {
        let base = Url::parse(&self.base_url).map_err(|e| HarnessError::Config {
            message: format!("invalid WEB_BASE_URL {:?}: {e}", self.base_url),
        })?;
        base.join(path)
            .map(String::from)
            .map_err(|e| HarnessError::Navigation {
                url: path.to_string(),
                message: e.to_string(),
            })
    }

    /// Navigate to `path` relative to the base URL
    pub async fn goto(&self, path: &str) -> HarnessResult<()> {
        let url = self.resolve_url(path)?;
        info!("Navigating to {}", url);
        self.driver.goto(&url).await
    }

    /// Current URL
    pub async fn url(&self) -> HarnessResult<String> {
        self.driver.current_url().await
    }

    /// Locator from a CSS selector
    pub fn locator(&self, css: impl Into<String>) -> Locator {
        Locator::new(self.clone(), Selector::css(css))
    }

    /// Locator from any strategy
    pub fn select(&self, selector: Selector) -> Locator {
        Locator::new(self.clone(), selector)
    }

    pub fn get_by_role(&self, role: impl Into<String>, name: impl Into<TextMatch>) -> Locator {
        self.select(Selector::role_named(role, name))
    }

    pub fn get_by_label(&self, text: impl Into<TextMatch>) -> Locator {
        self.select(Selector::label(text))
    }

    pub fn get_by_placeholder(&self, text: impl Into<TextMatch>) -> Locator {
        self.select(Selector::placeholder(text))
    }

    pub fn get_by_text(&self, text: impl Into<TextMatch>) -> Locator {
        self.select(Selector::text(text))
    }

    pub fn get_by_test_id(&self, id: impl Into<String>) -> Locator {
        self.select(Selector::test_id(id))
    }

    /// Arm acceptance of the next native dialog
    pub async fn arm_dialog(&self) -> HarnessResult<DialogWaiter> {
        self.driver.arm_dialog().await
    }

    /// Tear the session down
    pub async fn close(&self) -> HarnessResult<()> {
        debug!("Closing session");
        self.driver.close().await
    }
}

/// Produces a fresh isolated [`Session`] per test attempt
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, config: &EnvConfig) -> HarnessResult<Session>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{El, MockDom, MockDriver};

    fn session(base: &str) -> (Session, MockDriver) {
        let config = EnvConfig::from_vars(vec![("WEB_BASE_URL", base)]).unwrap();
        let driver = MockDriver::new(MockDom::new("about:blank"));
        (Session::new(Arc::new(driver.clone()), &config), driver)
    }

    #[test]
    fn test_resolve_relative_paths() {
        let (session, _) = session("https://candidates-qa.contalink.com/");
        assert_eq!(
            session.resolve_url("/").unwrap(),
            "https://candidates-qa.contalink.com/"
        );
        assert_eq!(
            session.resolve_url("/invoices").unwrap(),
            "https://candidates-qa.contalink.com/invoices"
        );
        assert_eq!(
            session.resolve_url("https://other.test/x").unwrap(),
            "https://other.test/x"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let (session, _) = session("not a url");
        assert!(matches!(
            session.resolve_url("/"),
            Err(HarnessError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_goto_uses_driver() {
        let (session, driver) = session("https://app.test/");
        driver
            .with_dom(|dom| {
                dom.set_router(Arc::new(|dom: &mut MockDom, _url: &str| {
                    let root = dom.root();
                    dom.append(root, El::new("h1").text("Hola"));
                }));
            })
            .unwrap();
        session.goto("/").await.unwrap();
        assert_eq!(session.url().await.unwrap(), "https://app.test/");
        assert_eq!(session.get_by_text("Hola").count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_test_id_leads_fallback_chain() {
        let (session, driver) = session("https://app.test/");
        let tagged = driver
            .with_dom(|dom| {
                let root = dom.root();
                dom.append(root, El::new("button").text("Cerrar Sesión"));
                dom.append(
                    root,
                    El::new("button")
                        .attr("data-testid", "logout-button")
                        .text("Salir"),
                )
            })
            .unwrap();
        let logout = || {
            session
                .get_by_test_id("logout-button")
                .or(session.get_by_text("Cerrar Sesión"))
        };

        assert_eq!(session.get_by_test_id("logout-button").count().await.unwrap(), 1);
        assert_eq!(session.get_by_test_id("missing").count().await.unwrap(), 0);
        assert_eq!(logout().inner_text().await.unwrap(), "Salir");

        driver.with_dom(|dom| dom.remove(tagged)).unwrap();
        assert_eq!(logout().inner_text().await.unwrap(), "Cerrar Sesión");
    }
}
