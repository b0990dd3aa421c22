//! Credits, credit assignments and refunds
//!
//! A credit is the payer-side balance produced by negative billing (or a
//! corrective campaign). Its balance is consumed through assignments against
//! invoices, or paid out externally as a refund.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{
    Amount, CreditAssignmentId, CreditId, CreditLineId, InvoiceId, PaymentId, PoolId, RefundId,
    RegieId,
};

use crate::invoice::{CancellationInfo, Origin};
use crate::settlement::Settlement;
use crate::snapshot::{PayerSnapshot, UserSnapshot};

/// A payer's credit balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credit {
    pub id: CreditId,
    pub uuid: Uuid,
    pub regie_id: RegieId,
    pub pool_id: Option<PoolId>,
    pub number: u64,
    pub formatted_number: String,
    pub label: String,
    /// Positive by construction: draft lines invert quantities on promotion
    pub total_amount: Amount,
    pub assigned_amount: Amount,
    pub remaining_amount: Amount,
    pub payer: PayerSnapshot,
    pub date_publication: NaiveDate,
    pub date_invoicing: Option<NaiveDate>,
    pub origin: Origin,
    /// Unusable credits are excluded from assignment and refunds
    pub usable: bool,
    /// The invoice this credit corrects, when it cancels one
    pub previous_invoice_id: Option<InvoiceId>,
    pub cancellation: Option<CancellationInfo<core_kernel::CreditCancellationReasonId>>,
    pub created_at: DateTime<Utc>,
}

impl Credit {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_some()
    }

    /// Whether this credit can be assigned to an invoice or refunded
    pub fn is_assignable(&self) -> bool {
        self.usable && !self.is_cancelled() && !self.remaining_amount.is_zero()
    }

    pub fn settlement(&self) -> Settlement {
        Settlement {
            total: self.total_amount,
            settled: self.assigned_amount,
        }
    }

    pub fn invoicing_date(&self) -> NaiveDate {
        self.date_invoicing.unwrap_or_else(|| self.created_at.date_naive())
    }

    pub fn notification_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "credit_id": self.uuid.to_string(),
            "credit": {
                "id": self.uuid.to_string(),
                "total_amount": self.total_amount,
            },
        })
    }
}

/// One line of a credit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditLine {
    pub id: CreditLineId,
    pub uuid: Uuid,
    pub credit_id: CreditId,
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

/// Application of (part of) a credit's balance
///
/// Exactly one of `invoice_id` / `refund_id` is set on a completed
/// assignment; `payment_id` backrefs the credit-typed payment created when
/// the assignment paid an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAssignment {
    pub id: CreditAssignmentId,
    pub credit_id: CreditId,
    pub invoice_id: Option<InvoiceId>,
    pub refund_id: Option<RefundId>,
    pub payment_id: Option<PaymentId>,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// An external payout of a credit balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub uuid: Uuid,
    pub regie_id: RegieId,
    pub number: u64,
    pub formatted_number: String,
    pub amount: Amount,
    pub payer: PayerSnapshot,
    pub date_refund: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Refund {
    pub fn refund_date(&self) -> NaiveDate {
        self.date_refund.unwrap_or_else(|| self.created_at.date_naive())
    }
}
