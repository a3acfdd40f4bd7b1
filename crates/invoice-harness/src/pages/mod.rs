//! Page objects for the invoicing application's screens.

pub mod access_code;
pub mod dashboard;
pub mod invoices;

pub use access_code::AccessCodePage;
pub use dashboard::DashboardPage;
pub use invoices::{normalize_date_for_input, Column, InvoicesPage};
