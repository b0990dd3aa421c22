//! Journal lines and injected lines
//!
//! A journal line is the atomic priced event: one row per (event, user) per
//! pricing computation. Lines belonging to draft pools are working data and
//! are pruned with their pool; lines of final pools persist and link to the
//! invoice or credit line they produced.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{
    Amount, CreditLineId, DraftInvoiceLineId, InjectedLineId, InvoiceLineId, JournalLineId, PoolId,
    RegieId,
};

use crate::snapshot::{PayerSnapshot, UserSnapshot};

/// How a line's quantity is expressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityType {
    #[default]
    Units,
    Minutes,
}

/// Pricing outcome recorded on a journal line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    Success,
    Warning,
    Error,
}

/// Manual triage state of an erroneous line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatus {
    Ignored,
    Fixed,
}

/// A manually inserted charge or credit bypassing the pricing engine
///
/// Immutable once created; positive amounts are charges, negative amounts
/// credits. Campaigns pick injected lines up according to their integration
/// mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectedLine {
    pub id: InjectedLineId,
    pub regie_id: RegieId,
    pub event_date: NaiveDate,
    pub slug: String,
    pub label: String,
    pub amount: Amount,
    pub user_external_id: String,
    pub payer: PayerSnapshot,
    pub created_at: DateTime<Utc>,
}

/// The pricing engine's output contract for one priced event
///
/// The pipeline treats pricing as a black box: whatever produced this data
/// (pricing engine, injected line expansion) is opaque. Error lines carry
/// their reason in `pricing_data` and never abort a pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalLineData {
    pub event_date: NaiveDate,
    pub slug: String,
    pub label: String,
    pub description: String,
    pub amount: Amount,
    pub quantity: Decimal,
    pub quantity_type: QuantityType,
    pub accounting_code: String,
    pub user: UserSnapshot,
    pub payer: PayerSnapshot,
    pub event: serde_json::Value,
    pub booking: serde_json::Value,
    pub pricing_data: serde_json::Value,
    pub status: LineStatus,
    pub from_injected_line: Option<InjectedLineId>,
}

impl JournalLineData {
    /// A successful line with the minimal fields filled in
    pub fn success(
        event_date: NaiveDate,
        slug: impl Into<String>,
        label: impl Into<String>,
        amount: Amount,
        user: UserSnapshot,
        payer: PayerSnapshot,
    ) -> Self {
        Self {
            event_date,
            slug: slug.into(),
            label: label.into(),
            description: String::new(),
            amount,
            quantity: Decimal::ONE,
            quantity_type: QuantityType::Units,
            accounting_code: String::new(),
            user,
            payer,
            event: serde_json::Value::Object(Default::default()),
            booking: serde_json::Value::Object(Default::default()),
            pricing_data: serde_json::Value::Object(Default::default()),
            status: LineStatus::Success,
            from_injected_line: None,
        }
    }

    /// An error line carrying its pricing error reason
    pub fn error(
        event_date: NaiveDate,
        slug: impl Into<String>,
        user: UserSnapshot,
        payer: PayerSnapshot,
        reason: &str,
    ) -> Self {
        let mut line = Self::success(
            event_date,
            slug,
            "",
            Amount::zero(),
            user,
            payer,
        );
        line.status = LineStatus::Error;
        line.pricing_data = serde_json::json!({ "error": reason });
        line
    }

    /// Builds pricing output from an injected line
    pub fn from_injected(injected: &InjectedLine) -> Self {
        let mut line = Self::success(
            injected.event_date,
            injected.slug.clone(),
            injected.label.clone(),
            injected.amount,
            UserSnapshot::new(injected.user_external_id.clone()),
            injected.payer.clone(),
        );
        line.from_injected_line = Some(injected.id);
        line
    }
}

/// A persisted journal line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalLine {
    pub id: JournalLineId,
    pub pool_id: Option<PoolId>,
    pub data: JournalLineData,
    pub error_status: Option<ErrorStatus>,
    /// Set once the line has been aggregated into a draft invoice line
    pub draft_invoice_line_id: Option<DraftInvoiceLineId>,
    /// Set once the line has been aggregated into an invoice line
    pub invoice_line_id: Option<InvoiceLineId>,
    /// Set once the line has been aggregated into a credit line
    pub credit_line_id: Option<CreditLineId>,
    pub created_at: DateTime<Utc>,
}

impl JournalLine {
    /// The pricing error reason for non-success lines
    pub fn error_reason(&self) -> Option<&str> {
        if self.data.status == LineStatus::Success {
            return None;
        }
        self.data.pricing_data.get("error").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserSnapshot {
        UserSnapshot::with_name("user:1", "Ada", "Lovelace")
    }

    fn payer() -> PayerSnapshot {
        PayerSnapshot::with_name("payer:1", "Ada", "Lovelace")
    }

    #[test]
    fn test_error_line_records_reason() {
        let date = NaiveDate::from_ymd_opt(2022, 9, 1).unwrap();
        let data = JournalLineData::error(date, "agenda@event", user(), payer(), "PricingNotFound");
        let line = JournalLine {
            id: JournalLineId::new(1),
            pool_id: None,
            data,
            error_status: None,
            draft_invoice_line_id: None,
            invoice_line_id: None,
            credit_line_id: None,
            created_at: Utc::now(),
        };
        assert_eq!(line.error_reason(), Some("PricingNotFound"));
    }

    #[test]
    fn test_success_line_has_no_error_reason() {
        let date = NaiveDate::from_ymd_opt(2022, 9, 1).unwrap();
        let data = JournalLineData::success(date, "s", "Label", Amount::from_cents(100), user(), payer());
        let line = JournalLine {
            id: JournalLineId::new(1),
            pool_id: None,
            data,
            error_status: None,
            draft_invoice_line_id: None,
            invoice_line_id: None,
            credit_line_id: None,
            created_at: Utc::now(),
        };
        assert_eq!(line.error_reason(), None);
    }
}
