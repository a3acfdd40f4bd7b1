//! Invoice request bodies.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Days between creation and the default due date
pub const DEFAULT_DUE_IN_DAYS: i64 = 7;

pub const DEFAULT_DESCRIPTION: &str = "Automation invoice for testing";
pub const DEFAULT_AMOUNT: f64 = 1250.0;
pub const DEFAULT_CURRENCY: &str = "USD";

/// Invoice lifecycle status as the API spells it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
}

impl InvoiceStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Largest integer an `f64` holds exactly
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Whole amounts go out as JSON integers (`1250`, not `1250.0`)
#[allow(clippy::cast_possible_truncation, clippy::trivially_copy_pass_by_ref)]
fn serialize_amount<S: Serializer>(amount: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if amount.fract() == 0.0 && amount.abs() <= MAX_EXACT_INTEGER {
        serializer.serialize_i64(*amount as i64)
    } else {
        serializer.serialize_f64(*amount)
    }
}

#[allow(clippy::ref_option)]
fn serialize_optional_amount<S: Serializer>(
    amount: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match amount {
        Some(amount) => serialize_amount(amount, serializer),
        None => serializer.serialize_none(),
    }
}

/// Full invoice body for create and replace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePayload {
    pub customer_name: String,
    pub description: String,
    #[serde(serialize_with = "serialize_amount")]
    pub amount: f64,
    pub currency: String,
    pub status: InvoiceStatus,
    /// `YYYY-MM-DD`
    pub due_date: String,
}

impl InvoicePayload {
    /// Start a payload with per-call defaults
    #[must_use]
    pub fn builder() -> InvoicePayloadBuilder {
        InvoicePayloadBuilder::default()
    }
}

/// Overrides applied on top of the defaults when the payload is built.
///
/// ```
/// use invoice_harness::api::{InvoicePayload, InvoiceStatus};
///
/// let payload = InvoicePayload::builder().status(InvoiceStatus::Paid).build();
/// assert_eq!(payload.currency, "USD");
/// assert!(payload.customer_name.starts_with("QA Customer "));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InvoicePayloadBuilder {
    customer_name: Option<String>,
    description: Option<String>,
    amount: Option<f64>,
    currency: Option<String>,
    status: Option<InvoiceStatus>,
    due_date: Option<String>,
}

impl InvoicePayloadBuilder {
    #[must_use]
    pub fn customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    #[must_use]
    pub const fn status(mut self, status: InvoiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    /// Build with defaults computed from the current time
    #[must_use]
    pub fn build(self) -> InvoicePayload {
        self.build_at(Utc::now())
    }

    /// Build with defaults computed from `now`
    #[must_use]
    pub fn build_at(self, now: DateTime<Utc>) -> InvoicePayload {
        InvoicePayload {
            customer_name: self
                .customer_name
                .unwrap_or_else(|| format!("QA Customer {}", now.timestamp_millis())),
            description: self
                .description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            amount: self.amount.unwrap_or(DEFAULT_AMOUNT),
            currency: self.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            status: self.status.unwrap_or_default(),
            due_date: self.due_date.unwrap_or_else(|| {
                (now + ChronoDuration::days(DEFAULT_DUE_IN_DAYS))
                    .format("%Y-%m-%d")
                    .to_string()
            }),
        }
    }
}

/// Partial invoice body; absent fields are left out of the JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_amount"
    )]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InvoiceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

impl InvoicePatch {
    /// Patch touching only the status
    #[must_use]
    pub fn status(status: InvoiceStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 28, 10, 30, 0).unwrap()
    }

    mod builder_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let now = fixed_now();
            let payload = InvoicePayload::builder().build_at(now);
            assert_eq!(
                payload.customer_name,
                format!("QA Customer {}", now.timestamp_millis())
            );
            assert_eq!(payload.description, DEFAULT_DESCRIPTION);
            assert!((payload.amount - 1250.0).abs() < f64::EPSILON);
            assert_eq!(payload.currency, "USD");
            assert_eq!(payload.status, InvoiceStatus::Draft);
            assert_eq!(payload.due_date, "2025-01-04");
        }

        #[test]
        fn test_overrides_replace_only_their_field() {
            let payload = InvoicePayload::builder()
                .status(InvoiceStatus::Paid)
                .amount(99.5)
                .customer_name("ACME")
                .build_at(fixed_now());
            assert_eq!(payload.status, InvoiceStatus::Paid);
            assert!((payload.amount - 99.5).abs() < f64::EPSILON);
            assert_eq!(payload.customer_name, "ACME");
            assert_eq!(payload.currency, DEFAULT_CURRENCY);
            assert_eq!(payload.due_date, "2025-01-04");
        }

        #[test]
        fn test_customer_names_follow_the_clock() {
            let a = InvoicePayload::builder().build_at(fixed_now());
            let b = InvoicePayload::builder()
                .build_at(fixed_now() + ChronoDuration::milliseconds(1));
            assert_ne!(a.customer_name, b.customer_name);
        }
    }

    mod serialization_tests {
        use super::*;

        #[test]
        fn test_payload_uses_api_field_names() {
            let payload = InvoicePayload::builder()
                .customer_name("ACME")
                .build_at(fixed_now());
            let value = serde_json::to_value(&payload).unwrap();
            assert_eq!(value["customerName"], "ACME");
            assert_eq!(value["dueDate"], "2025-01-04");
            assert_eq!(value["status"], "draft");
            assert_eq!(value["currency"], "USD");
        }

        #[test]
        fn test_whole_amounts_serialize_as_integers() {
            let payload = InvoicePayload::builder().build_at(fixed_now());
            assert_eq!(serde_json::to_string(&payload.amount).unwrap(), "1250.0");
            let value = serde_json::to_value(&payload).unwrap();
            assert_eq!(value["amount"], json!(1250));
            assert!(value["amount"].is_i64());

            let fractional = InvoicePayload::builder().amount(99.5).build_at(fixed_now());
            assert_eq!(serde_json::to_value(&fractional).unwrap()["amount"], json!(99.5));

            let patch = InvoicePatch {
                amount: Some(300.0),
                ..InvoicePatch::default()
            };
            assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "amount": 300 }));
        }

        #[test]
        fn test_patch_omits_absent_fields() {
            let value = serde_json::to_value(InvoicePatch::status(InvoiceStatus::Sent)).unwrap();
            assert_eq!(value, json!({ "status": "sent" }));
            assert_eq!(serde_json::to_value(InvoicePatch::default()).unwrap(), json!({}));
        }
    }
}
