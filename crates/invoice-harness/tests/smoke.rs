//! Smoke coverage of the main layout.

#![cfg(feature = "browser")]

mod common;

use common::run_ui;
use invoice_harness::prelude::*;

#[tokio::test]
async fn main_layout_and_critical_sections_are_visible() -> HarnessResult<()> {
    run_ui("main layout and critical sections are visible", |fx| async move {
        login(&fx).await?;
        let dashboard = fx.dashboard_page();
        dashboard.expect_loaded().await?;
        expect(&dashboard.layout()).to_be_visible().await
    })
    .await
}
