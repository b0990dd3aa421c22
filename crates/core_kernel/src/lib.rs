//! Core Kernel - Foundational types for the billing pipeline
//!
//! This crate provides the fundamental building blocks used across all domain
//! modules:
//! - Fixed-point monetary amounts with precise decimal arithmetic
//! - Strongly-typed entity identifiers
//! - A clock port so "current date" is always supplied from outside

pub mod amount;
pub mod error;
pub mod identifiers;
pub mod ports;
pub mod temporal;

pub use amount::{Amount, AmountError};
pub use error::CoreError;
pub use identifiers::{
    CallbackId, CampaignId, CollectionDocketId, CreditAssignmentId,
    CreditCancellationReasonId, CreditId, CreditLineId, DraftInvoiceId, DraftInvoiceLineId,
    InjectedLineId, InvoiceCancellationReasonId, InvoiceId, InvoiceLineId,
    InvoiceLinePaymentId, JournalLineId, PaymentCancellationReasonId, PaymentDocketId,
    PaymentId, PaymentTypeId, PoolId, RefundId, RegieId,
};
pub use ports::StoreError;
pub use temporal::{Clock, FixedClock, SystemClock};
