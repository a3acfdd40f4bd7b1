//! Shared helpers for the scenario suites.

#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, NaiveDate};
use invoice_harness::prelude::*;
use invoice_harness::{logging, InvoicesPage};
use regex::Regex;
use std::future::Future;
use std::sync::Arc;

/// Run `body` as a UI test against a freshly launched Chromium
pub async fn run_ui<F, Fut>(name: &str, body: F) -> HarnessResult<()>
where
    F: Fn(Fixtures) -> Fut,
    Fut: Future<Output = HarnessResult<()>>,
{
    run(UiTest::new(name, invoice_harness::config()?), body).await
}

/// Like [`run_ui`], holding `group` for the duration of the test
pub async fn run_serial<F, Fut>(
    group: &'static SerialGroup,
    name: &str,
    body: F,
) -> HarnessResult<()>
where
    F: Fn(Fixtures) -> Fut,
    Fut: Future<Output = HarnessResult<()>>,
{
    run(UiTest::new(name, invoice_harness::config()?).serial(group), body).await
}

async fn run<F, Fut>(test: UiTest, body: F) -> HarnessResult<()>
where
    F: Fn(Fixtures) -> Fut,
    Fut: Future<Output = HarnessResult<()>>,
{
    logging::init();
    let config: Arc<EnvConfig> = invoice_harness::config()?;
    let browser = Browser::launch(&config).await?;
    let outcome = test.run(&browser, body).await;
    outcome.after_cleanup(browser.close().await)
}

/// Log in and wait for the invoices screen
pub async fn open_invoices(fx: &Fixtures) -> HarnessResult<Arc<InvoicesPage>> {
    login(fx).await?;
    let invoices = fx.invoices_page();
    invoices.expect_loaded().await?;
    Ok(invoices)
}

/// Trimmed text of `column` in the first row
pub async fn first_row_value(invoices: &InvoicesPage, column: Column) -> HarnessResult<String> {
    let row = invoices.row(0);
    Ok(invoices.cell(&row, column).inner_text().await?.trim().to_string())
}

/// Assert that every visible row's `column` satisfies `check`, and that
/// there is at least one row
pub async fn expect_every_row(
    invoices: &InvoicesPage,
    column: Column,
    check: impl Fn(&str) -> bool,
) -> HarnessResult<()> {
    let values = invoices.column_values(column).await?;
    if values.is_empty() {
        return Err(HarnessError::assertion(format!(
            "expected at least one row when checking {column}"
        )));
    }
    match values.iter().find(|v| !check(v)) {
        Some(bad) => Err(HarnessError::assertion(format!(
            "unexpected {column} value {bad:?} in {values:?}"
        ))),
        None => Ok(()),
    }
}

/// `MM/DD/YYYY` form of the first `M/D/YY(YY)` date found in `raw`
pub fn to_date_input(raw: &str) -> Option<String> {
    let pattern = Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{2,4})").ok()?;
    let caps = pattern.captures(raw)?;
    let year = if caps[3].len() == 2 {
        format!("20{}", &caps[3])
    } else {
        caps[3].to_string()
    };
    Some(format!("{:0>2}/{:0>2}/{}", &caps[1], &caps[2], year))
}

/// Shift an `MM/DD/YYYY` date by `days`
pub fn add_days(value: &str, days: i64) -> Option<String> {
    let date = NaiveDate::parse_from_str(value, "%m/%d/%Y").ok()?;
    Some((date + ChronoDuration::days(days)).format("%m/%d/%Y").to_string())
}
