//! Settlement accounting shared by invoices and credits
//!
//! Invoice lines track a paid amount against their total; credit documents
//! track an assigned amount against theirs. Both obey the same invariant:
//! the settled amount never exceeds the total in magnitude and carries the
//! same sign, unless both are zero. Violations are rejected, never clamped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::{Amount, AmountError};

/// Violation of the settled-amount bounds
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettlementError {
    #[error("settled amount {settled} out of bounds for total {total}")]
    OutOfBounds { total: Amount, settled: Amount },

    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Checks the settled-amount invariant
///
/// Valid states: both zero; `0 ≤ settled ≤ total` for positive totals;
/// `total ≤ settled ≤ 0` for negative totals.
pub fn check_settlement(total: Amount, settled: Amount) -> Result<(), SettlementError> {
    let ok = if total.is_zero() {
        settled.is_zero()
    } else if total.is_positive() {
        !settled.is_negative() && settled <= total
    } else {
        !settled.is_positive() && settled >= total
    };
    if ok {
        Ok(())
    } else {
        Err(SettlementError::OutOfBounds { total, settled })
    }
}

/// A total with its settled portion
///
/// Used for both invoice paid amounts and credit assigned amounts; keeps the
/// remaining amount derived rather than stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub total: Amount,
    pub settled: Amount,
}

impl Settlement {
    /// An unsettled total
    pub fn open(total: Amount) -> Self {
        Self {
            total,
            settled: Amount::zero(),
        }
    }

    /// The amount still open
    pub fn remaining(&self) -> Amount {
        // totals and settled amounts both fit the digit bound, so the
        // difference does too
        self.total
            .checked_sub(self.settled)
            .unwrap_or_else(|_| Amount::zero())
    }

    pub fn is_settled(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Applies a settlement delta, validating the invariant on the result
    pub fn apply(&self, delta: Amount) -> Result<Settlement, SettlementError> {
        let settled = self.settled.checked_add(delta)?;
        check_settlement(self.total, settled)?;
        Ok(Settlement {
            total: self.total,
            settled,
        })
    }
}
