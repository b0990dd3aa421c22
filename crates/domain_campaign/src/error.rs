//! Campaign domain errors

use thiserror::Error;

use core_kernel::StoreError;
use domain_ledger::LedgerError;

use crate::pool::PoolPromotionError;
use crate::pricing::PricingError;

/// Errors from campaign-level operations
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Promotion(#[from] PoolPromotionError),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl CampaignError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CampaignError::InvalidOperation(message.into())
    }
}

/// Errors raised while executing a job
///
/// `WaitForOtherJobs` parks the job instead of failing it; `Abort` is the
/// controlled failure path carrying an operator-readable message. Everything
/// else is an infrastructure failure that also fails the job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("wait for other jobs")]
    WaitForOtherJobs,

    #[error("{0}")]
    Abort(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl JobError {
    pub fn abort(message: impl Into<String>) -> Self {
        JobError::Abort(message.into())
    }
}
