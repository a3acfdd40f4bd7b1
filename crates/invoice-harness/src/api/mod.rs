//! Invoicing REST API client and request bodies.

pub mod client;
pub mod payload;

pub use client::{invoice_id_of, ApiClient, ApiResponse, NOT_INITIALIZED};
pub use payload::{InvoicePatch, InvoicePayload, InvoicePayloadBuilder, InvoiceStatus};
