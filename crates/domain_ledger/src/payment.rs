//! Payments, line allocations and dockets

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{
    Amount, CollectionDocketId, InvoiceId, InvoiceLineId, InvoiceLinePaymentId, PaymentDocketId,
    PaymentId, PaymentTypeId, RegieId,
};

use crate::invoice::CancellationInfo;
use crate::snapshot::PayerSnapshot;

/// Free-form payment information keys shown on receipts
pub const PAYMENT_INFO_KEYS: [&str; 5] = [
    "check_issuer",
    "check_bank",
    "check_number",
    "bank_transfer_number",
    "payment_reference",
];

/// An atomic receipt of funds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub uuid: Uuid,
    pub regie_id: RegieId,
    pub number: u64,
    pub formatted_number: String,
    /// Strictly positive; sign lives on the allocations
    pub amount: Amount,
    pub payment_type_id: PaymentTypeId,
    pub payment_info: serde_json::Value,
    pub payer: PayerSnapshot,
    pub date_payment: Option<NaiveDate>,
    pub transaction_id: Option<String>,
    pub cancellation: Option<CancellationInfo<core_kernel::PaymentCancellationReasonId>>,
    pub docket_id: Option<PaymentDocketId>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_some()
    }

    /// The payment date used for numbering
    pub fn payment_date(&self) -> NaiveDate {
        self.date_payment.unwrap_or_else(|| self.created_at.date_naive())
    }

    /// Payment info pairs shown on receipts, in display order
    pub fn payment_info_entries(&self) -> Vec<(&'static str, String)> {
        PAYMENT_INFO_KEYS
            .iter()
            .filter_map(|key| {
                self.payment_info
                    .get(key)
                    .and_then(|v| v.as_str())
                    .map(|v| (*key, v.to_string()))
            })
            .collect()
    }
}

/// Fine-grained allocation of a payment's amount to one invoice line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLinePayment {
    pub id: InvoiceLinePaymentId,
    pub payment_id: PaymentId,
    pub line_id: InvoiceLineId,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// Per-invoice view of a payment, aggregated from its line allocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicePayment {
    pub payment_id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Amount,
}

/// A reconciliation batch of payments, grouped by payment type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDocket {
    pub id: PaymentDocketId,
    pub uuid: Uuid,
    pub regie_id: RegieId,
    pub number: u64,
    pub formatted_number: String,
    /// Payments created up to this date are collected
    pub date_end: NaiveDate,
    pub draft: bool,
    pub payment_type_ids: Vec<PaymentTypeId>,
    pub created_at: DateTime<Utc>,
}

impl PaymentDocket {
    /// Draft dockets display a temporary number
    pub fn display_number(&self) -> String {
        if self.draft {
            format!("TEMPORARY-{}", self.id)
        } else {
            self.formatted_number.clone()
        }
    }
}

/// A batch of unpaid invoices handed over for collective settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDocket {
    pub id: CollectionDocketId,
    pub uuid: Uuid,
    pub regie_id: RegieId,
    pub number: u64,
    pub formatted_number: String,
    pub date_end: NaiveDate,
    pub draft: bool,
    /// Add a collect-typed payment to the invoices when validated
    pub pay_invoices: bool,
    pub created_at: DateTime<Utc>,
}

impl CollectionDocket {
    pub fn display_number(&self) -> String {
        if self.draft {
            format!("TEMPORARY-{}", self.id)
        } else {
            self.formatted_number.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_payment_date_falls_back_to_creation() {
        let created = Utc.with_ymd_and_hms(2022, 10, 5, 9, 0, 0).unwrap();
        let payment = Payment {
            id: PaymentId::new(1),
            uuid: Uuid::new_v4(),
            regie_id: RegieId::new(1),
            number: 1,
            formatted_number: "R01-22-10-0000001".to_string(),
            amount: Amount::from_cents(100),
            payment_type_id: PaymentTypeId::new(1),
            payment_info: serde_json::Value::Object(Default::default()),
            payer: PayerSnapshot::new("payer:1"),
            date_payment: None,
            transaction_id: None,
            cancellation: None,
            docket_id: None,
            created_at: created,
        };
        assert_eq!(payment.payment_date(), created.date_naive());
        assert!(!payment.is_cancelled());
    }

    #[test]
    fn test_payment_info_entries_follow_display_order() {
        let created = Utc.with_ymd_and_hms(2022, 10, 5, 9, 0, 0).unwrap();
        let payment = Payment {
            id: PaymentId::new(1),
            uuid: Uuid::new_v4(),
            regie_id: RegieId::new(1),
            number: 1,
            formatted_number: "R01-22-10-0000001".to_string(),
            amount: Amount::from_cents(100),
            payment_type_id: PaymentTypeId::new(1),
            payment_info: serde_json::json!({
                "check_number": "42",
                "check_issuer": "Jean Dupont",
                "unknown_key": "dropped",
            }),
            payer: PayerSnapshot::new("payer:1"),
            date_payment: None,
            transaction_id: None,
            cancellation: None,
            docket_id: None,
            created_at: created,
        };
        assert_eq!(
            payment.payment_info_entries(),
            vec![
                ("check_issuer", "Jean Dupont".to_string()),
                ("check_number", "42".to_string()),
            ]
        );
    }
}
