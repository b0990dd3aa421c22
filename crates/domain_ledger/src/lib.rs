//! Ledger Domain - invoices, credits, payments and refunds
//!
//! This crate implements the settlement layer of the billing pipeline. Its
//! central invariant, shared by invoice paid amounts and credit assigned
//! amounts, is that a line's settled amount never exceeds its total in
//! magnitude and always carries the same sign. Document totals are
//! recomputed from their lines inside the same mutation as any settlement
//! change, so partially applied payments are never observable.
//!
//! # Payment allocation
//!
//! A payment against an invoice is decomposed line by line: lines are
//! consumed in id (creation) order, each receiving the lesser of its
//! remaining amount and what is left of the payment, compared by magnitude
//! and signed like the line. The decomposition is deterministic: re-running
//! it against the same state yields the same allocations.

pub mod credit;
pub mod error;
pub mod invoice;
pub mod journal;
pub mod payment;
pub mod service;
pub mod settlement;
pub mod snapshot;
pub mod store;

pub use credit::{Credit, CreditAssignment, CreditLine, Refund};
pub use error::{FieldError, LedgerError};
pub use invoice::{
    CancellationInfo, CancellationReason, CreditCancellationReason, DraftInvoice,
    DraftInvoiceLine, Invoice, InvoiceCancellationReason, InvoiceDates, InvoiceLine, Origin,
    PaymentCancellationReason,
};
pub use journal::{
    ErrorStatus, InjectedLine, JournalLine, JournalLineData, LineStatus, QuantityType,
};
pub use payment::{
    CollectionDocket, InvoiceLinePayment, InvoicePayment, Payment, PaymentDocket,
    PAYMENT_INFO_KEYS,
};
pub use service::{FinalizedDocument, LedgerService, PaymentRequest};
pub use settlement::{check_settlement, Settlement, SettlementError};
pub use snapshot::{PayerSnapshot, UserSnapshot};
pub use store::{
    LedgerStore, LineAllocation, NewDraftInvoice, NewJournalLine, NewLine, PayerDocumentFilter,
};
