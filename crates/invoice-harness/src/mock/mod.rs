//! In-memory browser driver for unit testing.
//!
//! [`MockDriver`] implements [`BrowserDriver`] over a scripted [`MockDom`],
//! so page objects, fixtures and the runner can be exercised without a
//! browser. It records every driver call for verification. [`MockLauncher`]
//! hands out a fresh document per session the way the real launcher hands
//! out a fresh browser context.

pub(crate) mod css;
pub mod dom;

#[cfg(test)]
pub(crate) mod app;

pub use dom::{El, MockDom, NodeId};

use crate::dialog::{Dialog, DialogWaiter};
use crate::driver::{BrowserDriver, ElementAction, ElementState};
use crate::env::EnvConfig;
use crate::result::{HarnessError, HarnessResult};
use crate::selector::Selector;
use crate::session::{Session, SessionLauncher};
use async_trait::async_trait;
use futures::FutureExt;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const DIALOG_POLL: Duration = Duration::from_millis(10);

/// Mock driver for unit testing
#[derive(Debug, Clone)]
pub struct MockDriver {
    dom: Arc<Mutex<MockDom>>,
    call_history: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

fn lock(dom: &Mutex<MockDom>) -> HarnessResult<MutexGuard<'_, MockDom>> {
    dom.lock().map_err(|_| HarnessError::IllegalState {
        message: "mock document lock poisoned".to_string(),
    })
}

/// Clears the armed flag when the waiter is accepted or dropped
struct Disarm(Arc<Mutex<MockDom>>);

impl Drop for Disarm {
    fn drop(&mut self) {
        if let Ok(mut dom) = self.0.lock() {
            dom.set_dialog_armed(false);
        }
    }
}

async fn wait_for_dialog(armed: Disarm) -> HarnessResult<Dialog> {
    loop {
        let accepted = lock(&armed.0)?.accept_pending_dialog();
        if let Some(dialog) = accepted {
            return Ok(dialog);
        }
        tokio::time::sleep(DIALOG_POLL).await;
    }
}

impl MockDriver {
    /// Driver over an existing document
    #[must_use]
    pub fn new(dom: MockDom) -> Self {
        Self {
            dom: Arc::new(Mutex::new(dom)),
            call_history: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run `f` against the document (test setup and inspection)
    pub fn with_dom<R>(&self, f: impl FnOnce(&mut MockDom) -> R) -> HarnessResult<R> {
        let mut dom = lock(&self.dom)?;
        Ok(f(&mut dom))
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.call_history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.history().iter().any(|c| c.starts_with(method))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) -> HarnessResult<()> {
        if self.is_closed() {
            return Err(HarnessError::Page {
                message: format!("{call} on closed session"),
            });
        }
        if let Ok(mut history) = self.call_history.lock() {
            history.push(call);
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn goto(&self, url: &str) -> HarnessResult<()> {
        self.record(format!("goto:{url}"))?;
        lock(&self.dom)?.navigate(url);
        Ok(())
    }

    async fn current_url(&self) -> HarnessResult<String> {
        if self.is_closed() {
            return Err(HarnessError::Page {
                message: "current_url on closed session".to_string(),
            });
        }
        Ok(lock(&self.dom)?.url().to_string())
    }

    async fn count(&self, selector: &Selector) -> HarnessResult<usize> {
        if self.is_closed() {
            return Err(HarnessError::Page {
                message: format!("count({selector}) on closed session"),
            });
        }
        Ok(lock(&self.dom)?.query(selector).len())
    }

    async fn inspect(
        &self,
        selector: &Selector,
        index: usize,
    ) -> HarnessResult<Option<ElementState>> {
        if self.is_closed() {
            return Err(HarnessError::Page {
                message: format!("inspect({selector}) on closed session"),
            });
        }
        let dom = lock(&self.dom)?;
        Ok(dom.query(selector).get(index).map(|&id| dom.state(id)))
    }

    async fn perform(
        &self,
        selector: &Selector,
        index: usize,
        action: &ElementAction,
    ) -> HarnessResult<bool> {
        self.record(format!("{action}:{selector}"))?;
        let mut dom = lock(&self.dom)?;
        let Some(&id) = dom.query(selector).get(index) else {
            return Ok(false);
        };
        Ok(match action {
            ElementAction::Click => {
                dom.click(id);
                true
            }
            ElementAction::Fill(value) => dom.fill(id, value),
            ElementAction::SelectOption(label) => dom.select_option(id, label),
        })
    }

    async fn arm_dialog(&self) -> HarnessResult<DialogWaiter> {
        self.record("arm_dialog".to_string())?;
        lock(&self.dom)?.set_dialog_armed(true);
        let disarm = Disarm(Arc::clone(&self.dom));
        Ok(DialogWaiter::new(wait_for_dialog(disarm).boxed()))
    }

    async fn close(&self) -> HarnessResult<()> {
        self.record("close".to_string())?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

type DomFactory = Arc<dyn Fn() -> MockDom + Send + Sync>;

/// Launches every session over a freshly built mock document
#[derive(Clone)]
pub struct MockLauncher {
    factory: DomFactory,
    launched: Arc<Mutex<Vec<MockDriver>>>,
}

impl fmt::Debug for MockLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockLauncher")
            .field("launched", &self.launched().len())
            .finish_non_exhaustive()
    }
}

impl MockLauncher {
    #[must_use]
    pub fn new(factory: impl Fn() -> MockDom + Send + Sync + 'static) -> Self {
        Self {
            factory: Arc::new(factory),
            launched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Drivers of every session launched so far, oldest first
    #[must_use]
    pub fn launched(&self) -> Vec<MockDriver> {
        self.launched
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionLauncher for MockLauncher {
    async fn launch(&self, config: &EnvConfig) -> HarnessResult<Session> {
        let driver = MockDriver::new((self.factory)());
        if let Ok(mut launched) = self.launched.lock() {
            launched.push(driver.clone());
        }
        Ok(Session::new(Arc::new(driver), config))
    }
}
