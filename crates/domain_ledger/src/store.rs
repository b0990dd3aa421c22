//! Ledger persistence port
//!
//! The store owns row-id allocation (ids ascend in creation order) and the
//! two settlement mutations that must be atomic: applying a payment's line
//! allocations and reversing them. Both enforce the settlement invariant and
//! recompute the affected invoices' totals in the same mutation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use core_kernel::{
    Amount, CollectionDocketId, CreditId, DraftInvoiceId, InvoiceId, InvoiceLineId, PaymentDocketId,
    PaymentId, PoolId, RefundId, RegieId, StoreError,
};

use crate::credit::{Credit, CreditAssignment, CreditLine, Refund};
use crate::invoice::{
    DraftInvoice, DraftInvoiceLine, Invoice, InvoiceCancellationReason, InvoiceLine,
    CreditCancellationReason, PaymentCancellationReason,
};
use crate::journal::{ErrorStatus, InjectedLine, JournalLine, JournalLineData};
use crate::payment::{CollectionDocket, InvoiceLinePayment, Payment, PaymentDocket};

/// Data for inserting a journal line; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewJournalLine {
    pub pool_id: Option<PoolId>,
    pub data: JournalLineData,
    pub error_status: Option<ErrorStatus>,
}

/// Data for inserting a draft invoice
#[derive(Debug, Clone)]
pub struct NewDraftInvoice {
    pub regie_id: RegieId,
    pub pool_id: Option<PoolId>,
    pub label: String,
    pub payer: crate::snapshot::PayerSnapshot,
    pub dates: crate::invoice::InvoiceDates,
    pub origin: crate::invoice::Origin,
    pub previous_invoice_id: Option<InvoiceId>,
    pub payment_callback_url: Option<String>,
    pub cancel_callback_url: Option<String>,
}

/// Line payload shared by draft invoice, invoice and credit lines
#[derive(Debug, Clone)]
pub struct NewLine {
    pub pool_id: Option<PoolId>,
    pub event_date: NaiveDate,
    pub label: String,
    pub quantity: rust_decimal::Decimal,
    pub unit_amount: Amount,
    pub description: String,
    pub event_slug: String,
    pub event_label: String,
    pub agenda_slug: String,
    pub activity_label: String,
    pub accounting_code: String,
    pub details: serde_json::Value,
    pub user: crate::snapshot::UserSnapshot,
}

/// One allocation produced by the payment algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAllocation {
    pub line_id: InvoiceLineId,
    pub amount: Amount,
}

/// Filters for the payer-scoped assignment queries
#[derive(Debug, Clone)]
pub struct PayerDocumentFilter {
    pub regie_id: RegieId,
    pub payer_external_id: String,
    /// Only invoices still payable on this date participate
    pub due_on_or_after: Option<NaiveDate>,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // -- injected lines

    async fn insert_injected_line(
        &self,
        regie_id: RegieId,
        event_date: NaiveDate,
        slug: String,
        label: String,
        amount: Amount,
        user_external_id: String,
        payer: crate::snapshot::PayerSnapshot,
        now: DateTime<Utc>,
    ) -> Result<InjectedLine, StoreError>;

    /// Injected lines of a regie dated before `end`, optionally bounded below
    async fn injected_lines(
        &self,
        regie_id: RegieId,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> Result<Vec<InjectedLine>, StoreError>;

    /// Injected line ids already billed: referenced by a journal line
    /// belonging to a final (non-draft) pool
    async fn consumed_injected_line_ids(
        &self,
        regie_id: RegieId,
    ) -> Result<Vec<core_kernel::InjectedLineId>, StoreError>;

    // -- journal lines

    async fn insert_journal_line(
        &self,
        line: NewJournalLine,
        now: DateTime<Utc>,
    ) -> Result<JournalLine, StoreError>;

    async fn journal_line(
        &self,
        id: core_kernel::JournalLineId,
    ) -> Result<JournalLine, StoreError>;

    /// Journal lines of a pool in id order
    async fn journal_lines_for_pool(&self, pool_id: PoolId) -> Result<Vec<JournalLine>, StoreError>;

    async fn update_journal_line(&self, line: &JournalLine) -> Result<(), StoreError>;

    // -- draft documents

    async fn insert_draft_invoice(
        &self,
        invoice: NewDraftInvoice,
        now: DateTime<Utc>,
    ) -> Result<DraftInvoice, StoreError>;

    async fn insert_draft_invoice_line(
        &self,
        invoice_id: DraftInvoiceId,
        line: NewLine,
        now: DateTime<Utc>,
    ) -> Result<DraftInvoiceLine, StoreError>;

    async fn draft_invoice(&self, id: DraftInvoiceId) -> Result<DraftInvoice, StoreError>;

    /// Draft invoices of a pool in id order
    async fn draft_invoices_for_pool(&self, pool_id: PoolId)
        -> Result<Vec<DraftInvoice>, StoreError>;

    /// Lines of a draft invoice in id order
    async fn draft_invoice_lines(
        &self,
        invoice_id: DraftInvoiceId,
    ) -> Result<Vec<DraftInvoiceLine>, StoreError>;

    /// Removes a pool's draft journal lines, draft invoices and their lines
    async fn delete_draft_documents_for_pool(&self, pool_id: PoolId) -> Result<(), StoreError>;

    // -- invoices

    #[allow(clippy::too_many_arguments)]
    async fn insert_invoice(
        &self,
        regie_id: RegieId,
        pool_id: Option<PoolId>,
        number: u64,
        formatted_number: String,
        label: String,
        payer: crate::snapshot::PayerSnapshot,
        dates: crate::invoice::InvoiceDates,
        origin: crate::invoice::Origin,
        previous_invoice_id: Option<InvoiceId>,
        payment_callback_url: Option<String>,
        cancel_callback_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Invoice, StoreError>;

    async fn insert_invoice_line(
        &self,
        invoice_id: InvoiceId,
        line: NewLine,
        total_amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<InvoiceLine, StoreError>;

    async fn invoice(&self, id: InvoiceId) -> Result<Invoice, StoreError>;

    async fn invoice_by_uuid(&self, uuid: Uuid) -> Result<Invoice, StoreError>;

    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), StoreError>;

    /// Lines of an invoice in id order, the allocation order
    async fn lines_for_invoice(&self, invoice_id: InvoiceId)
        -> Result<Vec<InvoiceLine>, StoreError>;

    /// Recomputes an invoice's paid/remaining amounts from its lines
    async fn recompute_invoice_totals(&self, invoice_id: InvoiceId) -> Result<Invoice, StoreError>;

    /// Outstanding invoices of a payer in id order: remaining amount non-zero,
    /// not cancelled, not collected, no basket origin, and (for campaign
    /// documents) belonging to a finalized campaign
    async fn outstanding_invoices_for_payer(
        &self,
        filter: &PayerDocumentFilter,
    ) -> Result<Vec<Invoice>, StoreError>;

    /// Invoices produced by a pool in id order
    async fn invoices_for_pool(&self, pool_id: PoolId) -> Result<Vec<Invoice>, StoreError>;

    // -- credits

    #[allow(clippy::too_many_arguments)]
    async fn insert_credit(
        &self,
        regie_id: RegieId,
        pool_id: Option<PoolId>,
        number: u64,
        formatted_number: String,
        label: String,
        payer: crate::snapshot::PayerSnapshot,
        date_publication: NaiveDate,
        date_invoicing: Option<NaiveDate>,
        origin: crate::invoice::Origin,
        usable: bool,
        previous_invoice_id: Option<InvoiceId>,
        now: DateTime<Utc>,
    ) -> Result<Credit, StoreError>;

    async fn insert_credit_line(
        &self,
        credit_id: CreditId,
        line: NewLine,
        quantity: rust_decimal::Decimal,
        total_amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<CreditLine, StoreError>;

    async fn credit(&self, id: CreditId) -> Result<Credit, StoreError>;

    async fn credit_by_uuid(&self, uuid: Uuid) -> Result<Credit, StoreError>;

    async fn update_credit(&self, credit: &Credit) -> Result<(), StoreError>;

    async fn lines_for_credit(&self, credit_id: CreditId) -> Result<Vec<CreditLine>, StoreError>;

    /// Recomputes a credit's total from its lines and re-derives remaining
    async fn recompute_credit_totals(&self, credit_id: CreditId) -> Result<Credit, StoreError>;

    /// Applies an assignment delta to a credit's assigned amount, enforcing
    /// the settlement invariant
    async fn apply_credit_assignment_amount(
        &self,
        credit_id: CreditId,
        delta: Amount,
    ) -> Result<Credit, StoreError>;

    /// Assignable credits of a payer in id order: usable, not cancelled,
    /// remaining non-zero, campaign finalized for campaign documents
    async fn assignable_credits_for_payer(
        &self,
        filter: &PayerDocumentFilter,
    ) -> Result<Vec<Credit>, StoreError>;

    /// Credits produced by a pool in id order
    async fn credits_for_pool(&self, pool_id: PoolId) -> Result<Vec<Credit>, StoreError>;

    // -- payments

    #[allow(clippy::too_many_arguments)]
    async fn insert_payment(
        &self,
        regie_id: RegieId,
        number: u64,
        formatted_number: String,
        amount: Amount,
        payment_type_id: core_kernel::PaymentTypeId,
        payment_info: serde_json::Value,
        payer: crate::snapshot::PayerSnapshot,
        date_payment: Option<NaiveDate>,
        transaction_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Payment, StoreError>;

    async fn payment(&self, id: PaymentId) -> Result<Payment, StoreError>;

    async fn payment_by_uuid(&self, uuid: Uuid) -> Result<Payment, StoreError>;

    async fn update_payment(&self, payment: &Payment) -> Result<(), StoreError>;

    /// Atomically records a payment's line allocations: creates the
    /// `InvoiceLinePayment` rows, moves each line's paid/remaining under the
    /// settlement invariant, and recomputes the touched invoices. Returns the
    /// updated invoices.
    async fn apply_line_payments(
        &self,
        payment_id: PaymentId,
        allocations: &[LineAllocation],
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, StoreError>;

    /// Atomically reverses every allocation of a payment. Partial reversal is
    /// never observable. Returns the updated invoices.
    async fn reverse_line_payments(
        &self,
        payment_id: PaymentId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, StoreError>;

    /// Allocations of a payment in id order
    async fn line_payments_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<InvoiceLinePayment>, StoreError>;

    /// Distinct invoices touched by a payment's allocations, in id order
    async fn invoices_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<Invoice>, StoreError>;

    /// Allocations touching an invoice in id order
    async fn line_payments_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<InvoiceLinePayment>, StoreError>;

    // -- assignments and refunds

    async fn insert_credit_assignment(
        &self,
        credit_id: CreditId,
        invoice_id: Option<InvoiceId>,
        refund_id: Option<RefundId>,
        payment_id: Option<PaymentId>,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<CreditAssignment, StoreError>;

    async fn assignments_for_credit(
        &self,
        credit_id: CreditId,
    ) -> Result<Vec<CreditAssignment>, StoreError>;

    async fn insert_refund(
        &self,
        regie_id: RegieId,
        number: u64,
        formatted_number: String,
        amount: Amount,
        payer: crate::snapshot::PayerSnapshot,
        date_refund: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<Refund, StoreError>;

    async fn refund_by_uuid(&self, uuid: Uuid) -> Result<Refund, StoreError>;

    // -- cancellation reasons

    async fn insert_invoice_cancellation_reason(
        &self,
        label: String,
        slug: String,
    ) -> Result<InvoiceCancellationReason, StoreError>;

    async fn list_invoice_cancellation_reasons(
        &self,
    ) -> Result<Vec<InvoiceCancellationReason>, StoreError>;

    async fn insert_payment_cancellation_reason(
        &self,
        label: String,
        slug: String,
    ) -> Result<PaymentCancellationReason, StoreError>;

    async fn payment_cancellation_reason(
        &self,
        id: core_kernel::PaymentCancellationReasonId,
    ) -> Result<PaymentCancellationReason, StoreError>;

    async fn insert_credit_cancellation_reason(
        &self,
        label: String,
        slug: String,
    ) -> Result<CreditCancellationReason, StoreError>;

    async fn invoice_cancellation_reason(
        &self,
        id: core_kernel::InvoiceCancellationReasonId,
    ) -> Result<InvoiceCancellationReason, StoreError>;

    async fn credit_cancellation_reason(
        &self,
        id: core_kernel::CreditCancellationReasonId,
    ) -> Result<CreditCancellationReason, StoreError>;

    // -- dockets

    async fn insert_payment_docket(
        &self,
        regie_id: RegieId,
        date_end: NaiveDate,
        payment_type_ids: Vec<core_kernel::PaymentTypeId>,
        now: DateTime<Utc>,
    ) -> Result<PaymentDocket, StoreError>;

    async fn update_payment_docket(&self, docket: &PaymentDocket) -> Result<(), StoreError>;

    async fn payment_docket(&self, id: PaymentDocketId) -> Result<PaymentDocket, StoreError>;

    /// Non-cancelled payments of the docket's types, created up to its end
    /// date and not yet on a docket, in id order
    async fn docketable_payments(
        &self,
        docket: &PaymentDocket,
    ) -> Result<Vec<Payment>, StoreError>;

    async fn payments_for_docket(
        &self,
        docket_id: PaymentDocketId,
    ) -> Result<Vec<Payment>, StoreError>;

    async fn insert_collection_docket(
        &self,
        regie_id: RegieId,
        date_end: NaiveDate,
        pay_invoices: bool,
        now: DateTime<Utc>,
    ) -> Result<CollectionDocket, StoreError>;

    async fn update_collection_docket(&self, docket: &CollectionDocket) -> Result<(), StoreError>;

    async fn collection_docket(&self, id: CollectionDocketId)
        -> Result<CollectionDocket, StoreError>;

    /// Invoices attached to a collection in id order
    async fn invoices_for_collection(
        &self,
        collection_id: CollectionDocketId,
    ) -> Result<Vec<Invoice>, StoreError>;

    /// Overdue invoices eligible for collection in id order: remaining
    /// non-zero, not cancelled, not already collected, due before the cutoff
    async fn collectable_invoices(
        &self,
        regie_id: RegieId,
        due_before: NaiveDate,
    ) -> Result<Vec<Invoice>, StoreError>;
}
