//! Invoices screen: search filters, action buttons and the results table.
//!
//! Filter controls are located through fallback chains (label first, then
//! a structural selector), so the page keeps working when the app drops a
//! `<label>` or renames a placeholder. `search` and `clear_filters` wait a
//! settle period after clicking because the table refreshes asynchronously;
//! callers that need a precise condition should assert with [`expect`]
//! instead, which retries.

use crate::assertion::expect;
use crate::dialog::Dialog;
use crate::locator::Locator;
use crate::page_object::PageObject;
use crate::result::HarnessResult;
use crate::selector::{Selector, TextMatch};
use crate::session::Session;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

/// Window in which a native confirmation dialog is accepted
pub const DIALOG_WINDOW: Duration = Duration::from_millis(1000);

/// Label of the default status option
pub const ALL_STATUSES: &str = "Todos los estados";

const DATE_PLACEHOLDER_INPUT: &str = "input[placeholder=\"mm/dd/yyyy\"]";

/// Results table columns, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Number,
    Total,
    Date,
    Status,
    Actions,
}

impl Column {
    /// Zero-based cell index within a row
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Id => 0,
            Self::Number => 1,
            Self::Total => 2,
            Self::Date => 3,
            Self::Status => 4,
            Self::Actions => 5,
        }
    }

    /// Header text as rendered by the app
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Number => "Número de Factura",
            Self::Total => "Total",
            Self::Date => "Fecha",
            Self::Status => "Estado",
            Self::Actions => "Acciones",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

fn slash_date() -> Option<&'static Regex> {
    static SLASH_DATE: OnceLock<Option<Regex>> = OnceLock::new();
    SLASH_DATE
        .get_or_init(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2,4})$").ok())
        .as_ref()
}

/// Rewrite `M/D/YY(YY)` into `YYYY-MM-DD` when the target input is a
/// structured date control. Anything else passes through untouched.
#[must_use]
pub fn normalize_date_for_input(input_type: Option<&str>, value: &str) -> String {
    if value.is_empty() || input_type != Some("date") {
        return value.to_string();
    }
    let Some(caps) = slash_date().and_then(|re| re.captures(value)) else {
        return value.to_string();
    };
    let (month, day, year) = (&caps[1], &caps[2], &caps[3]);
    let year = if year.len() == 2 {
        format!("20{year}")
    } else {
        year.to_string()
    };
    format!("{year}-{month:0>2}-{day:0>2}")
}

/// Page object for the invoices screen
#[derive(Debug, Clone)]
pub struct InvoicesPage {
    session: Session,
    settle: Duration,
}

impl InvoicesPage {
    #[must_use]
    pub const fn new(session: Session, settle: Duration) -> Self {
        Self { session, settle }
    }

    /// Settle period applied after `search` and `clear_filters`
    pub const fn settle(&self) -> Duration {
        self.settle
    }

    // ---- locators ------------------------------------------------------

    pub fn invoice_number_input(&self) -> Locator {
        self.session.get_by_placeholder("Ej: FAC-001")
    }

    pub fn status_select(&self) -> Locator {
        self.session
            .get_by_role("combobox", "Estado")
            .or(self.session.locator("select"))
    }

    pub fn start_date_input(&self) -> Locator {
        self.session
            .get_by_label("Fecha Inicial")
            .or(self.session.locator(DATE_PLACEHOLDER_INPUT).first())
    }

    pub fn end_date_input(&self) -> Locator {
        self.session
            .get_by_label("Fecha Final")
            .or(self.session.locator(DATE_PLACEHOLDER_INPUT).nth(1))
    }

    pub fn include_deleted_checkbox(&self) -> Locator {
        self.session
            .get_by_label("Incluir facturas eliminadas")
            .or(self.session.locator("input[type=\"checkbox\"]"))
    }

    pub fn search_button(&self) -> Locator {
        self.session.get_by_role("button", "Buscar")
    }

    pub fn clear_button(&self) -> Locator {
        self.session.get_by_role("button", "Limpiar Filtros")
    }

    pub fn logout_button(&self) -> Locator {
        self.session.get_by_role("button", "Cerrar Sesión")
    }

    pub fn new_invoice_button(&self) -> Locator {
        self.session.get_by_role("button", "Nueva Factura")
    }

    pub fn table(&self) -> Locator {
        self.session.locator("table")
    }

    pub fn table_rows(&self) -> Locator {
        self.session.locator("table tbody tr")
    }

    /// Row at `index` of the current results
    pub fn row(&self, index: usize) -> Locator {
        self.table_rows().nth(index)
    }

    /// Rows having a cell whose text is exactly `invoice_number`
    pub fn row_by_invoice_number(&self, invoice_number: &str) -> Locator {
        self.table_rows()
            .filter_has(Selector::text(TextMatch::exact(invoice_number)))
    }

    /// Cell of `row` in `column`
    pub fn cell(&self, row: &Locator, column: Column) -> Locator {
        row.clone().locator("th, td").nth(column.index())
    }

    pub fn column_header(&self, column: Column) -> Locator {
        self.session.get_by_role("columnheader", column.header())
    }

    // ---- verification --------------------------------------------------

    /// Title, filter section, action buttons and table all visible
    pub async fn expect_loaded(&self) -> HarnessResult<()> {
        PageObject::expect_loaded(self).await
    }

    pub async fn expect_table_columns(&self) -> HarnessResult<()> {
        for column in [
            Column::Id,
            Column::Number,
            Column::Total,
            Column::Status,
            Column::Actions,
        ] {
            expect(&self.column_header(column)).to_be_visible().await?;
        }
        Ok(())
    }

    // ---- actions -------------------------------------------------------

    /// Run the search with the current filters
    pub async fn search(&self) -> HarnessResult<()> {
        self.search_button().click().await?;
        self.wait_for_refresh().await;
        Ok(())
    }

    /// Reset every filter and wait for the table to refresh
    pub async fn clear_filters(&self) -> HarnessResult<()> {
        self.clear_button().click().await?;
        self.wait_for_refresh().await;
        Ok(())
    }

    async fn wait_for_refresh(&self) {
        if !self.settle.is_zero() {
            debug!("Letting results settle for {:?}", self.settle);
            tokio::time::sleep(self.settle).await;
        }
    }

    /// Sign out, accepting the confirmation dialog if the app shows one
    pub async fn logout(&self) -> HarnessResult<Option<Dialog>> {
        info!("Logging out");
        let waiter = self.session.arm_dialog().await?;
        self.logout_button().click().await?;
        Ok(waiter.accept_within(DIALOG_WINDOW).await)
    }

    /// Open the new invoice form
    pub async fn create_invoice(&self) -> HarnessResult<()> {
        self.new_invoice_button().click().await
    }

    pub async fn set_invoice_number(&self, value: &str) -> HarnessResult<()> {
        self.invoice_number_input().fill(value).await
    }

    /// Pick a status by its visible label
    pub async fn set_status(&self, label: &str) -> HarnessResult<()> {
        self.status_select().select_option(label).await
    }

    pub async fn set_start_date(&self, value: &str) -> HarnessResult<()> {
        self.fill_date(&self.start_date_input(), value).await
    }

    pub async fn set_end_date(&self, value: &str) -> HarnessResult<()> {
        self.fill_date(&self.end_date_input(), value).await
    }

    async fn fill_date(&self, input: &Locator, value: &str) -> HarnessResult<()> {
        let formatted = if value.is_empty() {
            String::new()
        } else {
            let input_type = input.get_attribute("type").await?;
            normalize_date_for_input(input_type.as_deref(), value)
        };
        input.fill(formatted).await
    }

    pub async fn toggle_include_deleted(&self) -> HarnessResult<()> {
        self.include_deleted_checkbox().click().await
    }

    /// Delete `row` through the last button of its actions cell, accepting
    /// the confirmation dialog if one appears
    pub async fn delete_row(&self, row: &Locator) -> HarnessResult<Option<Dialog>> {
        let waiter = self.session.arm_dialog().await?;
        self.cell(row, Column::Actions)
            .locator("button")
            .last()
            .click()
            .await?;
        Ok(waiter.accept_within(DIALOG_WINDOW).await)
    }

    // ---- derived queries -----------------------------------------------

    /// Visible text of the selected status option
    pub async fn selected_status_label(&self) -> HarnessResult<String> {
        self.status_select()
            .locator("option:checked")
            .inner_text()
            .await
    }

    pub async fn row_count(&self) -> HarnessResult<usize> {
        self.table_rows().count().await
    }

    /// Trimmed text of `column` for every row currently shown
    pub async fn column_values(&self, column: Column) -> HarnessResult<Vec<String>> {
        let count = self.row_count().await?;
        let mut values = Vec::with_capacity(count);
        for index in 0..count {
            let text = self.cell(&self.row(index), column).inner_text().await?;
            values.push(text.trim().to_string());
        }
        Ok(values)
    }
}

impl PageObject for InvoicesPage {
    fn session(&self) -> &Session {
        &self.session
    }

    fn landmarks(&self) -> Vec<Locator> {
        vec![
            self.session.get_by_role("heading", "Sistema de Facturas"),
            self.session
                .get_by_text(TextMatch::exact("Filtros de Búsqueda")),
            self.search_button(),
            self.clear_button(),
            self.logout_button(),
            self.new_invoice_button(),
            self.table(),
        ]
    }

    fn page_name(&self) -> &'static str {
        "InvoicesPage"
    }
}
