//! Real browser control over CDP (feature `browser`).
//!
//! One Chromium process per [`Browser`]; every [`Session`] it launches runs
//! in its own incognito browser context, which is disposed when the session
//! closes. DOM queries are the scripts from [`crate::script`] evaluated in
//! the page.

#![allow(clippy::significant_drop_tightening, clippy::items_after_statements)]

use crate::dialog::{Dialog, DialogType, DialogWaiter};
use crate::driver::{BrowserDriver, ElementAction, ElementState};
use crate::env::EnvConfig;
use crate::result::{HarnessError, HarnessResult};
use crate::script;
use crate::selector::Selector;
use crate::session::{Session, SessionLauncher};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::page::{
    DialogType as CdpDialogType, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::page::Page as CdpPage;
use futures::{FutureExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

fn page_error(e: impl fmt::Display) -> HarnessError {
    HarnessError::Page {
        message: e.to_string(),
    }
}

const fn dialog_type(kind: &CdpDialogType) -> DialogType {
    match kind {
        CdpDialogType::Alert => DialogType::Alert,
        CdpDialogType::Confirm => DialogType::Confirm,
        CdpDialogType::Prompt => DialogType::Prompt,
        CdpDialogType::Beforeunload => DialogType::BeforeUnload,
    }
}

/// Running Chromium instance
pub struct Browser {
    inner: Arc<Mutex<CdpBrowser>>,
    handle: JoinHandle<()>,
}

impl fmt::Debug for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Browser").finish_non_exhaustive()
    }
}

impl Browser {
    /// Launch Chromium honouring `HEADLESS` and `CHROMIUM_PATH`
    pub async fn launch(config: &EnvConfig) -> HarnessResult<Self> {
        let mut builder = CdpConfig::builder();
        if !config.headless() {
            builder = builder.with_head();
        }
        if let Some(path) = config.chromium_path() {
            builder = builder.chrome_executable(path);
        }
        if config.is_ci() {
            builder = builder.no_sandbox();
        }

        let cdp_config = builder
            .build()
            .map_err(|message| HarnessError::BrowserLaunch { message })?;

        let (browser, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| HarnessError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        info!("Chromium launched (headless: {})", config.headless());
        Ok(Self {
            inner: Arc::new(Mutex::new(browser)),
            handle,
        })
    }

    /// Open a page in a fresh incognito context
    pub async fn new_session(&self, config: &EnvConfig) -> HarnessResult<Session> {
        let (context_id, page) = {
            let mut browser = self.inner.lock().await;
            let context_id = browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await
                .map_err(page_error)?;
            let target = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(context_id.clone())
                .build()
                .map_err(page_error)?;
            let page = browser.new_page(target).await.map_err(page_error)?;
            (context_id, page)
        };
        debug!("Opened session in context {:?}", context_id);

        let driver = CdpSession::start(page, context_id, Arc::clone(&self.inner)).await?;
        Ok(Session::new(Arc::new(driver), config))
    }

    /// Shut Chromium down
    pub async fn close(self) -> HarnessResult<()> {
        let mut browser = self.inner.lock().await;
        browser.close().await.map_err(|e| HarnessError::BrowserLaunch {
            message: e.to_string(),
        })?;
        let _ = browser.wait().await;
        self.handle.abort();
        Ok(())
    }
}

#[async_trait]
impl SessionLauncher for Browser {
    async fn launch(&self, config: &EnvConfig) -> HarnessResult<Session> {
        self.new_session(config).await
    }
}

/// Decrements the armed counter when a waiter finishes or is dropped
struct Disarm(Arc<AtomicUsize>);

impl Drop for Disarm {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One page in its own browser context
pub struct CdpSession {
    page: CdpPage,
    context_id: BrowserContextId,
    browser: Arc<Mutex<CdpBrowser>>,
    armed: Arc<AtomicUsize>,
    dismisser: JoinHandle<()>,
    closed: AtomicBool,
}

impl fmt::Debug for CdpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpSession")
            .field("context_id", &self.context_id)
            .field("armed", &self.armed.load(Ordering::SeqCst))
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl CdpSession {
    async fn start(
        page: CdpPage,
        context_id: BrowserContextId,
        browser: Arc<Mutex<CdpBrowser>>,
    ) -> HarnessResult<Self> {
        let armed = Arc::new(AtomicUsize::new(0));

        // Dialogs nobody armed for would block the page forever.
        let mut events = page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(page_error)?;
        let dismiss_page = page.clone();
        let dismiss_armed = Arc::clone(&armed);
        let dismisser = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if dismiss_armed.load(Ordering::SeqCst) > 0 {
                    continue;
                }
                debug!("Dismissing unexpected {:?} dialog: {}", event.r#type, event.message);
                if let Err(e) = dismiss_page
                    .execute(HandleJavaScriptDialogParams::new(false))
                    .await
                {
                    warn!("Failed to dismiss dialog: {}", e);
                }
            }
        });

        Ok(Self {
            page,
            context_id,
            browser,
            armed,
            dismisser,
            closed: AtomicBool::new(false),
        })
    }

    async fn eval<T: DeserializeOwned>(&self, expression: String) -> HarnessResult<T> {
        let result = self.page.evaluate(expression).await.map_err(page_error)?;
        // CDP omits `value` for a `null` result
        let value = result.value().cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl BrowserDriver for CdpSession {
    async fn goto(&self, url: &str) -> HarnessResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| HarnessError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&self) -> HarnessResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(page_error)?
            .unwrap_or_default())
    }

    async fn count(&self, selector: &Selector) -> HarnessResult<usize> {
        self.eval(script::count(selector)).await
    }

    async fn inspect(
        &self,
        selector: &Selector,
        index: usize,
    ) -> HarnessResult<Option<ElementState>> {
        self.eval(script::inspect(selector, index)).await
    }

    async fn perform(
        &self,
        selector: &Selector,
        index: usize,
        action: &ElementAction,
    ) -> HarnessResult<bool> {
        self.eval(script::perform(selector, index, action)).await
    }

    async fn arm_dialog(&self) -> HarnessResult<DialogWaiter> {
        let mut events = self
            .page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(page_error)?;
        self.armed.fetch_add(1, Ordering::SeqCst);
        let guard = Disarm(Arc::clone(&self.armed));
        let page = self.page.clone();

        let accept = async move {
            let _guard = guard;
            let event = events.next().await.ok_or_else(|| HarnessError::Page {
                message: "session closed while waiting for a dialog".to_string(),
            })?;
            page.execute(HandleJavaScriptDialogParams::new(true))
                .await
                .map_err(page_error)?;
            Ok(Dialog::new(dialog_type(&event.r#type), event.message.clone()))
        };
        Ok(DialogWaiter::new(accept.boxed()))
    }

    async fn close(&self) -> HarnessResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.dismisser.abort();
        if let Err(e) = self.page.clone().close().await {
            debug!("Page already gone: {}", e);
        }
        self.browser
            .lock()
            .await
            .dispose_browser_context(self.context_id.clone())
            .await
            .map_err(page_error)?;
        debug!("Disposed context {:?}", self.context_id);
        Ok(())
    }
}
