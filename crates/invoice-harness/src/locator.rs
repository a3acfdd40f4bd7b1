//! Locator abstraction for element selection and interaction.
//!
//! A [`Locator`] is a lazily evaluated query bound to a [`Session`]. It holds
//! an ordered list of candidate [`Selector`]s (a fallback chain built with
//! [`Locator::or`]); every operation re-resolves the chain against the live
//! document and uses the first candidate that has a visible match.
//!
//! - **Auto-waiting**: actions wait up to the action budget for a visible match
//! - **Strict selection**: actions fail if the winning candidate matches more
//!   than one element, unless it was narrowed with `first`/`nth`/`last`
//! - **No caching**: nothing resolved is kept between calls

use crate::assertion::retry::{retry_until, AssertionCheckResult, RetryConfig};
use crate::driver::{ElementAction, ElementState};
use crate::result::{HarnessError, HarnessResult};
use crate::selector::Selector;
use crate::session::Session;
use std::time::Duration;
use tracing::debug;

/// Default polling interval for auto-waiting (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Locator options for customizing behavior
#[derive(Debug, Clone, Copy)]
pub struct LocatorOptions {
    /// Timeout for auto-waiting
    pub timeout: Duration,
    /// Polling interval for auto-waiting
    pub poll_interval: Duration,
    /// Whether to require strict single-element match
    pub strict: bool,
}

impl LocatorOptions {
    fn retry(&self) -> RetryConfig {
        RetryConfig::new(self.timeout).with_poll_interval(self.poll_interval)
    }
}

/// The candidate that won resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Winning selector
    pub selector: Selector,
    /// Number of elements it matches
    pub count: usize,
    /// Index of the first visible match, if any
    pub visible_index: Option<usize>,
}

/// A locator for finding and interacting with elements
#[derive(Debug, Clone)]
pub struct Locator {
    session: Session,
    candidates: Vec<Selector>,
    options: LocatorOptions,
}

impl Locator {
    /// Single-strategy locator using the session's action budget
    #[must_use]
    pub fn new(session: Session, selector: Selector) -> Self {
        let options = LocatorOptions {
            timeout: session.timeouts().action,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            strict: true,
        };
        Self {
            session,
            candidates: vec![selector],
            options,
        }
    }

    /// Append `fallback`'s strategies after this locator's own
    #[must_use]
    pub fn or(mut self, fallback: Self) -> Self {
        self.candidates.extend(fallback.candidates);
        self
    }

    fn map(mut self, f: impl Fn(Selector) -> Selector) -> Self {
        self.candidates = self.candidates.into_iter().map(f).collect();
        self
    }

    #[must_use]
    pub fn first(self) -> Self {
        self.nth(0)
    }

    #[must_use]
    pub fn nth(self, index: usize) -> Self {
        self.map(|s| s.nth(index))
    }

    #[must_use]
    pub fn last(self) -> Self {
        self.map(Selector::last)
    }

    /// Descendants matching `css` inside this locator's matches
    #[must_use]
    pub fn locator(self, css: impl Into<String>) -> Self {
        let css = Selector::css(css);
        self.map(|s| s.within(css.clone()))
    }

    /// Keep matches containing a match of `has`
    #[must_use]
    pub fn filter_has(self, has: Selector) -> Self {
        self.map(|s| s.has(has.clone()))
    }

    /// Set a custom timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Disable strict mode (allow multiple matches)
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    pub fn candidates(&self) -> &[Selector] {
        &self.candidates
    }

    pub const fn options(&self) -> &LocatorOptions {
        &self.options
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Human-readable description of the fallback chain
    pub fn description(&self) -> String {
        self.candidates
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ")
    }

    // ---- immediate queries ----------------------------------------------

    /// Evaluate the chain once: first candidate with a visible match wins.
    /// When nothing is visible, the first candidate with any match is
    /// reported with `visible_index: None`.
    pub async fn resolve(&self) -> HarnessResult<Option<Resolved>> {
        let driver = self.session.driver();
        let mut attached: Option<Resolved> = None;
        for selector in &self.candidates {
            let count = driver.count(selector).await?;
            if count == 0 {
                continue;
            }
            for index in 0..count {
                if let Some(state) = driver.inspect(selector, index).await? {
                    if state.visible {
                        return Ok(Some(Resolved {
                            selector: selector.clone(),
                            count,
                            visible_index: Some(index),
                        }));
                    }
                }
            }
            if attached.is_none() {
                attached = Some(Resolved {
                    selector: selector.clone(),
                    count,
                    visible_index: None,
                });
            }
        }
        Ok(attached)
    }

    /// Number of elements matched by the winning candidate (0 if none)
    pub async fn count(&self) -> HarnessResult<usize> {
        Ok(self.resolve().await?.map_or(0, |r| r.count))
    }

    /// Whether some candidate has a visible match right now
    pub async fn is_visible(&self) -> HarnessResult<bool> {
        Ok(self
            .resolve()
            .await?
            .is_some_and(|r| r.visible_index.is_some()))
    }

    /// Bounded, non-failing visibility probe. Driver errors and timeouts
    /// both read as "not visible".
    pub async fn probe_visible(&self, within: Duration) -> bool {
        let config = RetryConfig::new(within).with_poll_interval(self.options.poll_interval);
        retry_until(config, format!("{} to be visible", self.description()), move || async move {
            Ok(AssertionCheckResult::from_bool(self.is_visible().await?, (), || {
                "not visible".to_string()
            }))
        })
        .await
        .is_ok()
    }

    // ---- auto-waiting ------------------------------------------------------

    /// Wait for a visible match and check strictness
    async fn actionable(&self, what: &str) -> HarnessResult<(Selector, usize)> {
        let description = format!("{} to be actionable for {what}", self.description());
        let (resolved, _) = retry_until(self.options.retry(), description, move || async move {
            Ok(match self.resolve().await? {
                Some(r) if r.visible_index.is_some() => AssertionCheckResult::Pass(r),
                Some(r) => AssertionCheckResult::Fail(format!(
                    "{} matched {} hidden element(s)",
                    r.selector, r.count
                )),
                None => AssertionCheckResult::Fail("no element matched".to_string()),
            })
        })
        .await?;
        self.check_strict(&resolved)?;
        let index = resolved.visible_index.unwrap_or(0);
        Ok((resolved.selector, index))
    }

    /// Wait for an attached match (visible or not) and check strictness
    async fn attached(&self) -> HarnessResult<(Selector, usize)> {
        let description = format!("{} to be attached", self.description());
        let (resolved, _) = retry_until(self.options.retry(), description, move || async move {
            Ok(match self.resolve().await? {
                Some(r) => AssertionCheckResult::Pass(r),
                None => AssertionCheckResult::Fail("no element matched".to_string()),
            })
        })
        .await?;
        self.check_strict(&resolved)?;
        let index = resolved.visible_index.unwrap_or(0);
        Ok((resolved.selector, index))
    }

    fn check_strict(&self, resolved: &Resolved) -> HarnessResult<()> {
        if self.options.strict && resolved.count > 1 && !resolved.selector.is_positional() {
            return Err(HarnessError::AmbiguousOrMissingElement {
                locator: resolved.selector.to_string(),
                count: resolved.count,
            });
        }
        Ok(())
    }

    async fn perform(&self, action: ElementAction) -> HarnessResult<()> {
        let (selector, index) = self.actionable(&action.to_string()).await?;
        debug!("{} on {}", action, selector);
        let applied = self
            .session
            .driver()
            .perform(&selector, index, &action)
            .await?;
        if applied {
            Ok(())
        } else {
            Err(HarnessError::AssertionFailed {
                message: format!("{action} did not apply to {selector}"),
            })
        }
    }

    // ---- actions -------------------------------------------------------------

    /// Click the element
    pub async fn click(&self) -> HarnessResult<()> {
        self.perform(ElementAction::Click).await
    }

    /// Replace the element's value
    pub async fn fill(&self, text: impl Into<String>) -> HarnessResult<()> {
        self.perform(ElementAction::Fill(text.into())).await
    }

    /// Select the `<option>` with the given visible label
    pub async fn select_option(&self, label: impl Into<String>) -> HarnessResult<()> {
        self.perform(ElementAction::SelectOption(label.into())).await
    }

    /// Click only if the checkbox state differs from `checked`
    pub async fn set_checked(&self, checked: bool) -> HarnessResult<()> {
        if self.is_checked().await? != checked {
            self.click().await?;
        }
        Ok(())
    }

    // ---- reads ---------------------------------------------------------------

    /// Snapshot of the element
    pub async fn state(&self) -> HarnessResult<ElementState> {
        let (selector, index) = self.attached().await?;
        self.session
            .driver()
            .inspect(&selector, index)
            .await?
            .ok_or_else(|| HarnessError::AmbiguousOrMissingElement {
                locator: selector.to_string(),
                count: 0,
            })
    }

    pub async fn inner_text(&self) -> HarnessResult<String> {
        Ok(self.state().await?.text)
    }

    pub async fn input_value(&self) -> HarnessResult<String> {
        let state = self.state().await?;
        state.value.ok_or_else(|| HarnessError::AssertionFailed {
            message: format!("{} is not a form control", self.description()),
        })
    }

    pub async fn get_attribute(&self, name: &str) -> HarnessResult<Option<String>> {
        Ok(self.state().await?.attribute(name).map(str::to_string))
    }

    pub async fn is_checked(&self) -> HarnessResult<bool> {
        Ok(self.state().await?.checked)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::env::EnvConfig;
    use crate::mock::{El, MockDom, MockDriver};
    use crate::selector::TextMatch;
    use crate::session::Timeouts;
    use std::sync::Arc;

    fn session_over(dom: MockDom) -> (Session, MockDriver) {
        let config = EnvConfig::from_vars(Vec::<(String, String)>::new()).unwrap();
        let driver = MockDriver::new(dom);
        let session = Session::new(Arc::new(driver.clone()), &config).with_timeouts(Timeouts {
            action: Duration::from_millis(150),
            expect: Duration::from_millis(150),
        });
        (session, driver)
    }

    fn filters() -> MockDom {
        let mut dom = MockDom::new("https://app.test/");
        let root = dom.root();
        dom.append(root, El::new("input").attr("placeholder", "mm/dd/yyyy").attr("type", "date"));
        dom.append(root, El::new("input").attr("placeholder", "mm/dd/yyyy").attr("type", "date"));
        dom.append(root, El::new("select").id("estado"));
        dom.append(root, El::new("button").text("Buscar"));
        dom.append(root, El::new("button").text("Buscar avanzado").hidden());
        dom
    }

    mod resolution_tests {
        use super::*;

        #[tokio::test]
        async fn test_fallback_used_when_primary_missing() {
            let (session, _) = session_over(filters());
            let start = session
                .get_by_label("Fecha Inicial")
                .or(session.locator("input[placeholder=\"mm/dd/yyyy\"]").first());
            let resolved = start.resolve().await.unwrap().unwrap();
            assert_eq!(
                resolved.selector,
                Selector::css("input[placeholder=\"mm/dd/yyyy\"]").nth(0)
            );
            assert_eq!(resolved.count, 1);
        }

        #[tokio::test]
        async fn test_primary_wins_when_visible() {
            let (session, _) = session_over(filters());
            let status = session
                .get_by_role("combobox", "Estado")
                .or(session.locator("select"));
            // No label for the select: only the fallback matches.
            assert_eq!(status.resolve().await.unwrap().unwrap().selector, Selector::css("select"));

            let search = session.get_by_role("button", TextMatch::exact("Buscar"));
            let resolved = search.resolve().await.unwrap().unwrap();
            assert_eq!(resolved.count, 1);
            assert_eq!(resolved.visible_index, Some(0));
        }

        #[tokio::test]
        async fn test_hidden_only_match_is_not_visible() {
            let (session, _) = session_over(filters());
            let hidden = session.get_by_role("button", "avanzado");
            assert!(!hidden.is_visible().await.unwrap());
            assert_eq!(hidden.count().await.unwrap(), 1);
            assert!(!hidden.probe_visible(Duration::from_millis(30)).await);
        }

        #[tokio::test]
        async fn test_nothing_matches() {
            let (session, _) = session_over(filters());
            let missing = session.locator("#nope").or(session.get_by_text("nada"));
            assert!(missing.resolve().await.unwrap().is_none());
            assert_eq!(missing.count().await.unwrap(), 0);
        }
    }

    mod action_tests {
        use super::*;

        #[tokio::test]
        async fn test_strict_mode_rejects_ambiguous() {
            let (session, _) = session_over(filters());
            let dates = session.locator("input[placeholder=\"mm/dd/yyyy\"]");
            let err = dates.fill("2024-01-01").await.unwrap_err();
            assert!(matches!(err, HarnessError::AmbiguousOrMissingElement { count: 2, .. }));
            dates.clone().nth(1).fill("2024-01-31").await.unwrap();
            dates.with_strict(false).fill("2024-01-01").await.unwrap();
        }

        #[tokio::test]
        async fn test_click_times_out_when_missing() {
            let (session, _) = session_over(filters());
            let err = session.locator("#missing").click().await.unwrap_err();
            assert!(matches!(err, HarnessError::AssertionTimeout { timeout_ms: 150, .. }));
        }

        #[tokio::test]
        async fn test_hidden_element_is_not_actionable() {
            let (session, driver) = session_over(filters());
            let hidden = session.get_by_role("button", "avanzado");
            assert!(hidden.click().await.is_err());
            assert!(!driver.was_called("click"));
        }

        #[tokio::test]
        async fn test_fill_and_read_back() {
            let (session, _) = session_over(filters());
            let end = session.locator("input[placeholder=\"mm/dd/yyyy\"]").nth(1);
            end.fill("2024-02-29").await.unwrap();
            assert_eq!(end.input_value().await.unwrap(), "2024-02-29");
            assert_eq!(end.get_attribute("type").await.unwrap().as_deref(), Some("date"));
        }

        #[tokio::test]
        async fn test_waits_for_late_element() {
            let (session, driver) = session_over(MockDom::new("https://app.test/"));
            let late = driver.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                late.with_dom(|dom| {
                    let root = dom.root();
                    dom.append(root, El::new("button").text("Nueva Factura"));
                })
                .unwrap();
            });
            session
                .get_by_role("button", "Nueva Factura")
                .click()
                .await
                .unwrap();
        }

        #[tokio::test]
        async fn test_set_checked_is_idempotent() {
            let mut dom = MockDom::new("https://app.test/");
            let root = dom.root();
            dom.append(root, El::new("input").attr("type", "checkbox"));
            let (session, _) = session_over(dom);
            let toggle = session.locator("input[type=\"checkbox\"]");
            toggle.set_checked(true).await.unwrap();
            toggle.set_checked(true).await.unwrap();
            assert!(toggle.is_checked().await.unwrap());
            toggle.set_checked(false).await.unwrap();
            assert!(!toggle.is_checked().await.unwrap());
        }
    }
}
