//! Page Object Model support.
//!
//! A page object wraps one logical screen of the application. It is bound to
//! a single [`Session`] for its whole life and keeps no element handles: each
//! accessor builds a fresh [`Locator`] that re-resolves against the live
//! document.
//!
//! ```ignore
//! struct InvoicesPage { session: Session }
//!
//! impl PageObject for InvoicesPage {
//!     fn session(&self) -> &Session { &self.session }
//!     fn landmarks(&self) -> Vec<Locator> {
//!         vec![self.session.get_by_role("heading", "Sistema de Facturas")]
//!     }
//! }
//!
//! invoices.expect_loaded().await?;
//! ```

use crate::assertion::{expect, expect_page};
use crate::locator::Locator;
use crate::result::HarnessResult;
use crate::selector::TextMatch;
use crate::session::Session;
use async_trait::async_trait;
use tracing::debug;

/// A page or component of the application under test
#[async_trait]
pub trait PageObject: Send + Sync {
    /// Session the page is bound to
    fn session(&self) -> &Session;

    /// Elements that must be visible once the screen has loaded, in the
    /// order they are checked
    fn landmarks(&self) -> Vec<Locator>;

    /// URL the screen is expected to be served from, if it is fixed
    fn url_pattern(&self) -> Option<TextMatch> {
        None
    }

    /// Get the page name for logging/debugging
    fn page_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Assert every landmark is visible within the expectation budget
    async fn expect_loaded(&self) -> HarnessResult<()> {
        debug!("Waiting for {} to load", self.page_name());
        if let Some(pattern) = self.url_pattern() {
            expect_page(self.session()).to_have_url(pattern).await?;
        }
        for landmark in self.landmarks() {
            expect(&landmark).to_be_visible().await?;
        }
        Ok(())
    }
}
