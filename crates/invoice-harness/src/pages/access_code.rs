//! Access-code gate at the application root.

use crate::assertion::{expect, expect_page};
use crate::locator::Locator;
use crate::page_object::PageObject;
use crate::result::{HarnessError, HarnessResult};
use crate::selector::TextMatch;
use crate::session::Session;
use reqwest::Url;
use tracing::info;

/// Access code input
pub const ACCESS_CODE_INPUT: &str = "#access-code";

/// Accessible name of the submit button
pub const SUBMIT_BUTTON_NAME: &str = "Validar Código";

/// Feedback shown for a rejected code
pub const INVALID_CODE_MESSAGE: &str =
    "El código de acceso no es válido. Por favor, verifica e intenta nuevamente.";

/// Page object for the access-code screen
#[derive(Debug, Clone)]
pub struct AccessCodePage {
    session: Session,
}

impl AccessCodePage {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn code_input(&self) -> Locator {
        self.session.locator(ACCESS_CODE_INPUT)
    }

    pub fn submit_button(&self) -> Locator {
        self.session.get_by_role("button", SUBMIT_BUTTON_NAME)
    }

    /// The invalid-code feedback, matched exactly
    pub fn invalid_code_message(&self) -> Locator {
        self.session.get_by_text(TextMatch::exact(INVALID_CODE_MESSAGE))
    }

    /// Host of the configured base URL, which the landing page must be on
    fn landing_host(&self) -> HarnessResult<String> {
        Url::parse(self.session.base_url())
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .ok_or_else(|| HarnessError::Config {
                message: format!("WEB_BASE_URL {:?} has no host", self.session.base_url()),
            })
    }

    /// Navigate to the base URL and check we landed on the right site
    pub async fn goto(&self) -> HarnessResult<()> {
        self.session.goto("/").await?;
        let host = self.landing_host()?;
        expect_page(&self.session)
            .to_have_url(TextMatch::contains(host))
            .await
    }

    pub async fn enter_access_code(&self, code: &str) -> HarnessResult<()> {
        let input = self.code_input();
        expect(&input).to_be_visible().await?;
        input.fill(code).await
    }

    pub async fn submit_access_code(&self) -> HarnessResult<()> {
        let button = self.submit_button();
        expect(&button).to_be_visible().await?;
        button.click().await
    }

    /// Full login flow: open the gate, type the code, submit
    pub async fn login(&self, code: &str) -> HarnessResult<()> {
        info!("Logging in with access code");
        self.goto().await?;
        self.enter_access_code(code).await?;
        self.submit_access_code().await
    }
}

impl PageObject for AccessCodePage {
    fn session(&self) -> &Session {
        &self.session
    }

    fn landmarks(&self) -> Vec<Locator> {
        vec![self.code_input(), self.submit_button()]
    }

    fn page_name(&self) -> &'static str {
        "AccessCodePage"
    }
}
