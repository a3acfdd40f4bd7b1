//! Retrying expectations over locators and the page URL.
//!
//! ```ignore
//! expect(&invoices.search_button()).to_be_visible().await?;
//! expect(&invoices.table_rows()).to_have_count(0).await?;
//! expect_page(&session).not().to_have_url(TextMatch::contains("access")).await?;
//! ```
//!
//! Each expectation polls until it holds or the session's expectation
//! budget runs out, then fails with [`HarnessError::AssertionTimeout`].

pub mod retry;

use crate::driver::ElementState;
use crate::locator::{Locator, Resolved};
use crate::result::HarnessResult;
use crate::selector::TextMatch;
use crate::session::Session;
use retry::{retry_until, AssertionCheckResult, RetryConfig};
use std::time::Duration;

/// What an expectation sees on one poll
#[derive(Debug, Clone, Default)]
pub struct Observed {
    /// Winning candidate, if any matched
    pub resolved: Option<Resolved>,
    /// State of the first visible (else first) match
    pub state: Option<ElementState>,
}

impl Observed {
    fn visible(&self) -> bool {
        self.resolved
            .as_ref()
            .is_some_and(|r| r.visible_index.is_some())
    }

    fn count(&self) -> usize {
        self.resolved.as_ref().map_or(0, |r| r.count)
    }
}

async fn observe(locator: &Locator) -> HarnessResult<Observed> {
    let resolved = locator.resolve().await?;
    let state = match &resolved {
        Some(r) => {
            locator
                .session()
                .driver()
                .inspect(&r.selector, r.visible_index.unwrap_or(0))
                .await?
        }
        None => None,
    };
    Ok(Observed { resolved, state })
}

fn negatable(outcome: Result<(), String>, negate: bool) -> AssertionCheckResult {
    match (outcome, negate) {
        (Ok(()), false) | (Err(_), true) => AssertionCheckResult::Pass(()),
        (Err(message), false) => AssertionCheckResult::Fail(message),
        (Ok(()), true) => AssertionCheckResult::Fail("condition unexpectedly held".to_string()),
    }
}

/// Expectation over a locator
#[derive(Debug, Clone)]
pub struct LocatorExpect {
    locator: Locator,
    timeout: Duration,
    negate: bool,
}

/// Create an expectation for a locator
#[must_use]
pub fn expect(locator: &Locator) -> LocatorExpect {
    LocatorExpect {
        locator: locator.clone(),
        timeout: locator.session().timeouts().expect,
        negate: false,
    }
}

impl LocatorExpect {
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Invert the next assertion
    #[must_use]
    pub const fn not(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    async fn verify<F>(&self, what: &str, check: F) -> HarnessResult<()>
    where
        F: Fn(&Observed) -> Result<(), String>,
    {
        let description = format!(
            "{}{} {what}",
            self.locator.description(),
            if self.negate { " not" } else { "" }
        );
        let config = RetryConfig::new(self.timeout)
            .with_poll_interval(self.locator.options().poll_interval);
        let check = &check;
        let locator = &self.locator;
        let negate = self.negate;
        retry_until(config, description, move || async move {
            let observed = observe(locator).await?;
            Ok(negatable(check(&observed), negate))
        })
        .await?;
        Ok(())
    }

    /// Some candidate has a visible match
    pub async fn to_be_visible(&self) -> HarnessResult<()> {
        self.verify("to be visible", |o| {
            if o.visible() {
                Ok(())
            } else if o.count() > 0 {
                Err(format!("{} match(es), none visible", o.count()))
            } else {
                Err("no element matched".to_string())
            }
        })
        .await
    }

    /// No candidate has a visible match
    pub async fn to_be_hidden(&self) -> HarnessResult<()> {
        self.clone().not().to_be_visible().await
    }

    pub async fn to_have_count(&self, expected: usize) -> HarnessResult<()> {
        self.verify(&format!("to have count {expected}"), |o| {
            if o.count() == expected {
                Ok(())
            } else {
                Err(format!("count is {}", o.count()))
            }
        })
        .await
    }

    /// Text equals `expected` after whitespace normalisation
    pub async fn to_have_text(&self, expected: &str) -> HarnessResult<()> {
        self.to_match_text(TextMatch::exact(expected)).await
    }

    /// Text contains `expected` (case-insensitive)
    pub async fn to_contain_text(&self, expected: &str) -> HarnessResult<()> {
        self.to_match_text(TextMatch::contains(expected)).await
    }

    pub async fn to_match_text(&self, expected: TextMatch) -> HarnessResult<()> {
        self.verify(&format!("to have text {expected}"), |o| match &o.state {
            Some(state) if expected.matches(&state.text) => Ok(()),
            Some(state) => Err(format!("text is {:?}", state.text)),
            None => Err("no element matched".to_string()),
        })
        .await
    }

    /// Form control value equals `expected` exactly
    pub async fn to_have_value(&self, expected: &str) -> HarnessResult<()> {
        self.verify(&format!("to have value {expected:?}"), |o| {
            match o.state.as_ref().and_then(|s| s.value.as_deref()) {
                Some(value) if value == expected => Ok(()),
                Some(value) => Err(format!("value is {value:?}")),
                None => Err("no form control matched".to_string()),
            }
        })
        .await
    }

    /// Selected option label of a `<select>` equals `expected`
    pub async fn to_have_selected_label(&self, expected: &str) -> HarnessResult<()> {
        self.verify(&format!("to have selected option {expected:?}"), |o| {
            match o.state.as_ref().and_then(|s| s.selected_label.as_deref()) {
                Some(label) if label == expected => Ok(()),
                Some(label) => Err(format!("selected option is {label:?}")),
                None => Err("no select matched".to_string()),
            }
        })
        .await
    }

    pub async fn to_be_checked(&self) -> HarnessResult<()> {
        self.verify("to be checked", |o| match &o.state {
            Some(state) if state.checked => Ok(()),
            Some(_) => Err("unchecked".to_string()),
            None => Err("no element matched".to_string()),
        })
        .await
    }

    pub async fn not_to_be_checked(&self) -> HarnessResult<()> {
        self.verify("to be unchecked", |o| match &o.state {
            Some(state) if !state.checked => Ok(()),
            Some(_) => Err("checked".to_string()),
            None => Err("no element matched".to_string()),
        })
        .await
    }
}

/// Expectation over the session's URL
#[derive(Debug, Clone)]
pub struct PageExpect {
    session: Session,
    timeout: Duration,
    negate: bool,
}

/// Create an expectation for the page URL
#[must_use]
pub fn expect_page(session: &Session) -> PageExpect {
    PageExpect {
        session: session.clone(),
        timeout: session.timeouts().expect,
        negate: false,
    }
}

impl PageExpect {
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn not(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub async fn to_have_url(&self, expected: TextMatch) -> HarnessResult<()> {
        let description = format!(
            "page URL{} to match {expected}",
            if self.negate { " not" } else { "" }
        );
        let config = RetryConfig::new(self.timeout);
        let session = &self.session;
        let expected = &expected;
        let negate = self.negate;
        retry_until(config, description, move || async move {
            let url = session.url().await?;
            let outcome = if expected.matches(&url) {
                Ok(())
            } else {
                Err(format!("URL is {url}"))
            };
            Ok(negatable(outcome, negate))
        })
        .await?;
        Ok(())
    }
}
