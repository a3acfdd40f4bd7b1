//! Invoice Harness: end-to-end and API tests for the invoicing web app
//!
//! Drives a browser through the access-code gate and the invoices screen,
//! and exercises the invoicing REST API, through a small fixture and
//! page-object layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Invoice Harness Architecture                    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Scenarios  │    │ Fixtures + │    │ Browser    │            │
//! │   │ (tests/)   │───►│ Page       │───►│ Driver     │            │
//! │   │            │    │ Objects    │    │ (CDP/mock) │            │
//! │   └─────┬──────┘    └────────────┘    └────────────┘            │
//! │         │           ┌────────────┐    ┌────────────┐            │
//! │         └──────────►│ ApiClient  │───►│ REST API   │            │
//! │                     └────────────┘    └────────────┘            │
//! │                 EnvConfig (.env + process env)                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use invoice_harness::prelude::*;
//!
//! let config = invoice_harness::config()?;
//! let browser = Browser::launch(&config).await?;
//! UiTest::new("invalid access code shows feedback", config)
//!     .run(&browser, |fx| async move {
//!         let gate = fx.access_code_page();
//!         gate.goto().await?;
//!         gate.enter_access_code("INVALID_CODE").await?;
//!         gate.submit_access_code().await?;
//!         expect(&gate.invalid_code_message()).to_be_visible().await
//!     })
//!     .await
//!     .into_result()?;
//! ```

#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

pub mod api;
mod assertion;
#[cfg(feature = "browser")]
mod browser;
mod dialog;
pub mod driver;
pub mod env;
mod fixture;
mod locator;
pub mod logging;
pub mod mock;
mod page_object;
pub mod pages;
mod result;
pub mod runner;
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
mod script;
mod selector;
mod session;

pub use api::{ApiClient, ApiResponse, InvoicePatch, InvoicePayload, InvoiceStatus};
pub use assertion::{expect, expect_page, LocatorExpect, PageExpect};
#[cfg(feature = "browser")]
pub use browser::{Browser, CdpSession};
pub use dialog::{Dialog, DialogType, DialogWaiter};
pub use driver::{BrowserDriver, ElementAction, ElementState};
pub use env::{config, require_env, EnvConfig, EnvKey};
pub use fixture::{login, Fixture, Fixtures, LOGIN_SKIP_REASON};
pub use locator::{Locator, LocatorOptions, Resolved};
pub use page_object::PageObject;
pub use pages::{AccessCodePage, Column, DashboardPage, InvoicesPage};
pub use result::{HarnessError, HarnessResult};
pub use runner::{SerialGroup, StepStatus, Suite, TestOutcome, UiTest};
pub use selector::{Selector, TextMatch};
pub use session::{Session, SessionLauncher, Timeouts};

/// Prelude for scenario suites
pub mod prelude {
    #[cfg(feature = "browser")]
    pub use super::Browser;
    pub use super::{
        expect, expect_page, login, ApiClient, Column, EnvConfig, EnvKey, Fixtures, HarnessError,
        HarnessResult, InvoicePatch, InvoicePayload, InvoiceStatus, PageObject, Selector,
        SerialGroup, Suite, TestOutcome, TextMatch, UiTest,
    };
}
