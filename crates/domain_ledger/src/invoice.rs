//! Invoices and draft invoices
//!
//! Draft invoices are the working output of a draft pool; they carry no real
//! number. Final invoices are numbered from the regie counter at promotion
//! time and track paid/remaining amounts line by line.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{
    Amount, CollectionDocketId, DraftInvoiceId, DraftInvoiceLineId, InvoiceId, InvoiceLineId,
    PoolId, RegieId,
};

use crate::settlement::Settlement;
use crate::snapshot::{PayerSnapshot, UserSnapshot};

/// Where a document originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Api,
    Basket,
    Campaign,
}

/// The date set attached to an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDates {
    /// Date on which the invoice becomes visible on the portal
    pub publication: NaiveDate,
    /// Deadline displayed to the user; effective deadline when absent
    pub payment_deadline_displayed: Option<NaiveDate>,
    /// Date after which the invoice is no longer payable online
    pub payment_deadline: NaiveDate,
    /// Date after which the invoice is no longer payable at the counter
    pub due: NaiveDate,
    /// Direct-debit date, for payers on direct debit
    pub debit: Option<NaiveDate>,
    /// Override for the invoicing date used in numbering
    pub invoicing: Option<NaiveDate>,
}

impl InvoiceDates {
    pub fn new(publication: NaiveDate, payment_deadline: NaiveDate, due: NaiveDate) -> Self {
        Self {
            publication,
            payment_deadline_displayed: None,
            payment_deadline,
            due,
            debit: None,
            invoicing: None,
        }
    }

    /// The deadline shown to the payer
    pub fn displayed_payment_deadline(&self) -> NaiveDate {
        self.payment_deadline_displayed.unwrap_or(self.payment_deadline)
    }
}

/// Cancellation record stamped on cancelled documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationInfo<ReasonId> {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: Option<String>,
    pub reason_id: ReasonId,
    pub description: String,
}

/// An administrator-managed cancellation reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationReason<Id> {
    pub id: Id,
    pub label: String,
    pub slug: String,
    pub disabled: bool,
}

pub type InvoiceCancellationReason =
    CancellationReason<core_kernel::InvoiceCancellationReasonId>;
pub type PaymentCancellationReason =
    CancellationReason<core_kernel::PaymentCancellationReasonId>;
pub type CreditCancellationReason =
    CancellationReason<core_kernel::CreditCancellationReasonId>;

/// A draft invoice produced by a draft pool (or a basket)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftInvoice {
    pub id: DraftInvoiceId,
    pub regie_id: RegieId,
    pub pool_id: Option<PoolId>,
    pub label: String,
    /// Sum of the draft lines; negative totals promote into credits
    pub total_amount: Amount,
    pub payer: PayerSnapshot,
    pub dates: InvoiceDates,
    pub origin: Origin,
    pub previous_invoice_id: Option<InvoiceId>,
    pub payment_callback_url: Option<String>,
    pub cancel_callback_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DraftInvoice {
    /// Draft documents display a temporary number, never a counter value
    pub fn formatted_number(&self) -> String {
        format!("TEMPORARY-{}", self.id)
    }
}

/// One line of a draft invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftInvoiceLine {
    pub id: DraftInvoiceLineId,
    pub invoice_id: DraftInvoiceId,
    pub pool_id: Option<PoolId>,
    pub event_date: NaiveDate,
    pub label: String,
    pub quantity: Decimal,
    pub unit_amount: Amount,
    pub total_amount: Amount,
    pub description: String,
    pub event_slug: String,
    pub event_label: String,
    pub agenda_slug: String,
    pub activity_label: String,
    pub accounting_code: String,
    pub details: serde_json::Value,
    pub user: UserSnapshot,
    pub created_at: DateTime<Utc>,
}

/// A finalized invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// Public identifier exposed to external systems
    pub uuid: Uuid,
    pub regie_id: RegieId,
    pub pool_id: Option<PoolId>,
    /// Counter-backed sequence number, allocated at finalization
    pub number: u64,
    pub formatted_number: String,
    pub label: String,
    pub total_amount: Amount,
    pub paid_amount: Amount,
    pub remaining_amount: Amount,
    pub payer: PayerSnapshot,
    pub dates: InvoiceDates,
    pub origin: Origin,
    /// Usable documents participate in credit assignment
    pub usable: bool,
    pub previous_invoice_id: Option<InvoiceId>,
    pub payment_callback_url: Option<String>,
    pub cancel_callback_url: Option<String>,
    pub cancellation: Option<CancellationInfo<core_kernel::InvoiceCancellationReasonId>>,
    pub collection_id: Option<CollectionDocketId>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn is_paid(&self) -> bool {
        self.remaining_amount.is_zero()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_some()
    }

    /// Whether a payment can still target this invoice
    pub fn is_payable(&self) -> bool {
        !self.is_cancelled() && self.collection_id.is_none() && !self.remaining_amount.is_zero()
    }

    /// The invoicing date used for numbering
    pub fn invoicing_date(&self) -> NaiveDate {
        self.dates.invoicing.unwrap_or_else(|| self.created_at.date_naive())
    }

    /// Payload sent to the payment callback once the invoice is fully paid
    pub fn payment_notification_payload(&self, payment_uuid: Uuid) -> serde_json::Value {
        serde_json::json!({
            "payment_id": payment_uuid.to_string(),
            "invoice_id": self.uuid.to_string(),
            "invoice": {
                "id": self.uuid.to_string(),
                "total_amount": self.total_amount,
                "remaining_amount": self.remaining_amount,
            },
        })
    }

    /// Payload sent to the cancel callback
    pub fn cancel_notification_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "invoice_id": self.uuid.to_string(),
            "invoice": {
                "id": self.uuid.to_string(),
                "total_amount": self.total_amount,
                "remaining_amount": self.remaining_amount,
            },
        })
    }
}

/// One line of a finalized invoice
///
/// Lines own the fine-grained settlement state; the invoice totals are
/// recomputed from lines inside every mutation that touches them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub id: InvoiceLineId,
    pub uuid: Uuid,
    pub invoice_id: InvoiceId,
    pub pool_id: Option<PoolId>,
    pub event_date: NaiveDate,
    pub label: String,
    pub quantity: Decimal,
    pub unit_amount: Amount,
    pub total_amount: Amount,
    pub paid_amount: Amount,
    pub remaining_amount: Amount,
    pub description: String,
    pub event_slug: String,
    pub event_label: String,
    pub agenda_slug: String,
    pub activity_label: String,
    pub accounting_code: String,
    pub details: serde_json::Value,
    pub user: UserSnapshot,
    pub created_at: DateTime<Utc>,
}

impl InvoiceLine {
    /// The line's settlement view
    pub fn settlement(&self) -> Settlement {
        Settlement {
            total: self.total_amount,
            settled: self.paid_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_displayed_deadline_falls_back() {
        let mut dates = InvoiceDates::new(
            NaiveDate::from_ymd_opt(2022, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2022, 10, 31).unwrap(),
            NaiveDate::from_ymd_opt(2022, 11, 30).unwrap(),
        );
        assert_eq!(
            dates.displayed_payment_deadline(),
            NaiveDate::from_ymd_opt(2022, 10, 31).unwrap()
        );
        dates.payment_deadline_displayed = NaiveDate::from_ymd_opt(2022, 10, 15);
        assert_eq!(
            dates.displayed_payment_deadline(),
            NaiveDate::from_ymd_opt(2022, 10, 15).unwrap()
        );
    }
}
