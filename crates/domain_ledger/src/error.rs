//! Ledger domain errors

use thiserror::Error;

use core_kernel::{AmountError, StoreError};
use domain_regie::NumberingError;

use crate::settlement::SettlementError;

/// Errors that can occur in the ledger domain
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error("numbering error: {0}")]
    Numbering(#[from] NumberingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Structured field errors for API input
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// The operation is refused in the document's current state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl LedgerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        LedgerError::InvalidOperation(message.into())
    }
}

/// One field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn required(field: &'static str) -> Self {
        Self::new(field, "This field is required.")
    }
}
