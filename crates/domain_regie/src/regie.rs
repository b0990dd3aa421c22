//! Regie management
//!
//! A regie is one billing unit (cash register): the scope for document
//! numbering, payment types and payer resolution policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{PaymentTypeId, RegieId};

/// A billing unit owning counters, campaigns and documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Regie {
    /// Row identifier
    pub id: RegieId,
    pub label: String,
    /// Unique identifier used in URLs and exports
    pub slug: String,
    pub description: Option<String>,
    /// Whether this regie bills through invoicing campaigns
    pub with_campaigns: bool,
    /// Use a credit when created to pay old invoices
    pub assign_credits_on_creation: bool,

    /// Counter name template; date fields make counters reset per period
    pub counter_name: String,
    pub invoice_number_format: String,
    pub collection_number_format: String,
    pub payment_number_format: String,
    pub docket_number_format: String,
    pub credit_number_format: String,
    pub refund_number_format: String,

    /// Prefix prepended to every resolved payer external id
    pub payer_external_id_prefix: String,
    /// Template resolving a payer external id from a user external id
    pub payer_external_id_template: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Regie {
    /// Creates a regie with the default numbering templates
    pub fn new(id: RegieId, label: impl Into<String>, slug: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            label: label.into(),
            slug: slug.into(),
            description: None,
            with_campaigns: false,
            assign_credits_on_creation: true,
            counter_name: "{yy}".to_string(),
            invoice_number_format: "F{regie_id:02d}-{yy}-{mm}-{number:07d}".to_string(),
            collection_number_format: "T{regie_id:02d}-{yy}-{mm}-{number:07d}".to_string(),
            payment_number_format: "R{regie_id:02d}-{yy}-{mm}-{number:07d}".to_string(),
            docket_number_format: "B{regie_id:02d}-{yy}-{mm}-{number:07d}".to_string(),
            credit_number_format: "A{regie_id:02d}-{yy}-{mm}-{number:07d}".to_string(),
            refund_number_format: "V{regie_id:02d}-{yy}-{mm}-{number:07d}".to_string(),
            payer_external_id_prefix: String::new(),
            payer_external_id_template: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Default payment types seeded on every new regie
pub const DEFAULT_PAYMENT_TYPES: [(&str, &str); 8] = [
    ("credit", "Credit"),
    ("creditcard", "Credit card"),
    ("cash", "Cash"),
    ("check", "Check"),
    ("directdebit", "Direct debit"),
    ("online", "Online"),
    ("cesu", "CESU"),
    ("holidaycheck", "Holiday check"),
];

/// A payment type configured on a regie
///
/// `(regie, slug)` is unique; disabled types are hidden from the payment API
/// but remain attached to historical payments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentType {
    pub id: PaymentTypeId,
    pub regie_id: RegieId,
    pub label: String,
    pub slug: String,
    pub disabled: bool,
}

impl PaymentType {
    pub fn new(
        id: PaymentTypeId,
        regie_id: RegieId,
        label: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        Self {
            id,
            regie_id,
            label: label.into(),
            slug: slug.into(),
            disabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_number_formats() {
        let now = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let regie = Regie::new(RegieId::new(1), "Foo", "foo", now);
        assert_eq!(regie.counter_name, "{yy}");
        assert!(regie.invoice_number_format.starts_with('F'));
        assert!(regie.credit_number_format.starts_with('A'));
        assert!(regie.refund_number_format.starts_with('V'));
        assert!(regie.assign_credits_on_creation);
    }
}
