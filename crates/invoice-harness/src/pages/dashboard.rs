//! Landing screen after login.

use crate::assertion::expect;
use crate::locator::Locator;
use crate::page_object::PageObject;
use crate::result::HarnessResult;
use crate::selector::{Selector, TextMatch};
use crate::session::Session;
use std::time::Duration;
use tracing::debug;

/// How long the optional user menu gets to show up
pub const USER_MENU_PROBE: Duration = Duration::from_millis(500);

const HEADING_NAMES: [&str; 4] = ["candidate", "dashboard", "home", "invoices"];
const USER_MENU_NAMES: [&str; 3] = ["menu", "profile", "account"];
const SIGN_OUT_NAMES: [&str; 3] = ["logout", "sign out", "cerrar sesión"];

/// Page object for the post-login dashboard
#[derive(Debug, Clone)]
pub struct DashboardPage {
    session: Session,
}

impl DashboardPage {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn heading(&self) -> Locator {
        self.session
            .get_by_role("heading", TextMatch::any_of(HEADING_NAMES))
    }

    pub fn user_menu_button(&self) -> Locator {
        self.session
            .get_by_role("button", TextMatch::any_of(USER_MENU_NAMES))
    }

    /// Sign-out affordance: a button, else any text naming it
    pub fn logged_in_indicator(&self) -> Locator {
        self.session
            .get_by_role("button", TextMatch::any_of(SIGN_OUT_NAMES))
            .or(self.session.get_by_text(TextMatch::any_of(SIGN_OUT_NAMES)))
    }

    /// Main layout landmark: the navigation bar, else the main region
    pub fn layout(&self) -> Locator {
        self.session
            .select(Selector::role("navigation"))
            .or(self.session.select(Selector::role("main")))
    }

    /// Click the user menu if it shows up; layouts without one are fine
    pub async fn open_user_menu_if_present(&self) -> HarnessResult<()> {
        let button = self.user_menu_button();
        if button.probe_visible(USER_MENU_PROBE).await {
            button.click().await?;
        } else {
            debug!("No user menu in this layout");
        }
        Ok(())
    }

    pub async fn expect_logged_in_indicator(&self) -> HarnessResult<()> {
        expect(&self.logged_in_indicator()).to_be_visible().await
    }
}

impl PageObject for DashboardPage {
    fn session(&self) -> &Session {
        &self.session
    }

    fn landmarks(&self) -> Vec<Locator> {
        vec![self.heading()]
    }

    fn page_name(&self) -> &'static str {
        "DashboardPage"
    }
}
