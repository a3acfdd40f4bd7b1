//! Browser driver seam.
//!
//! A [`BrowserDriver`] is one isolated browsing session: a single page inside
//! its own context. Two implementations exist:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  BrowserDriver (async trait)                                  │
//! ├──────────────────────────────┬───────────────────────────────┤
//! │  CdpSession (feature browser) │  MockDriver                  │
//! │  chromiumoxide, incognito     │  in-memory document, scripted │
//! │  context per session          │  click handlers and dialogs   │
//! └──────────────────────────────┴───────────────────────────────┘
//! ```
//!
//! Drivers answer instantaneous questions only. Waiting, fallback chains and
//! strictness live in [`crate::locator`] and [`crate::assertion`].

use crate::dialog::DialogWaiter;
use crate::result::HarnessResult;
use crate::selector::Selector;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Point-in-time view of one matched element
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementState {
    /// Rendered and not hidden by style
    pub visible: bool,
    /// Normalised rendered text
    pub text: String,
    /// Current value of form controls; `None` for other elements
    pub value: Option<String>,
    /// Checkbox / radio checked state
    pub checked: bool,
    /// Attributes as present in the DOM
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Visible label of the selected `<option>` for `<select>` elements
    pub selected_label: Option<String>,
}

impl ElementState {
    /// Attribute lookup
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Mutation performed on one element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementAction {
    Click,
    /// Replace the value of an input
    Fill(String),
    /// Select the `<option>` whose visible label equals the string
    SelectOption(String),
}

impl fmt::Display for ElementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click => write!(f, "click"),
            Self::Fill(v) => write!(f, "fill({v:?})"),
            Self::SelectOption(l) => write!(f, "select_option({l:?})"),
        }
    }
}

/// One isolated browsing session.
///
/// Implementations must be cheap to query repeatedly; locators poll them.
#[async_trait]
pub trait BrowserDriver: Send + Sync + fmt::Debug {
    /// Navigate to an absolute URL and wait for the load to finish
    async fn goto(&self, url: &str) -> HarnessResult<()>;

    /// Current page URL
    async fn current_url(&self) -> HarnessResult<String>;

    /// Number of elements `selector` matches right now
    async fn count(&self, selector: &Selector) -> HarnessResult<usize>;

    /// State of the `index`-th match, `None` if there is no such element
    async fn inspect(&self, selector: &Selector, index: usize)
        -> HarnessResult<Option<ElementState>>;

    /// Apply `action` to the `index`-th match. Returns `false` if the
    /// element disappeared or the action did not apply (e.g. unknown option).
    async fn perform(
        &self,
        selector: &Selector,
        index: usize,
        action: &ElementAction,
    ) -> HarnessResult<bool>;

    /// Arm acceptance of the next native dialog.
    ///
    /// Must be called before the action that opens the dialog. Dialogs that
    /// open while nothing is armed are dismissed by the driver.
    async fn arm_dialog(&self) -> HarnessResult<DialogWaiter>;

    /// Tear the session down
    async fn close(&self) -> HarnessResult<()>;
}
