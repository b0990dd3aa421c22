//! Counter allocation
//!
//! Every document family draws its sequence numbers from a counter scoped by
//! `(regie, name, kind)`. Allocation must be atomic: concurrent callers for
//! the same counter receive distinct consecutive values, never a duplicate.
//! Gaps (from callers that roll back afterwards) are acceptable.

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{RegieId, StoreError};

use crate::numbering::{self, CounterKind, FormatError};
use crate::regie::Regie;
use thiserror::Error;

/// Atomic counter allocation port
///
/// Implementations hold a row per `(regie, name, kind)` starting at zero and
/// increment-and-read under exclusion; the first allocation returns 1.
#[async_trait]
pub trait CounterPort: Send + Sync {
    async fn next_value(
        &self,
        regie_id: RegieId,
        name: &str,
        kind: CounterKind,
    ) -> Result<u64, StoreError>;
}

/// Errors allocating a document number
#[derive(Debug, Error)]
pub enum NumberingError {
    #[error("number format error: {0}")]
    Format(#[from] FormatError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Allocates and formats the next document number for a regie
///
/// The counter name is rendered from the regie's template against the
/// document date, so templates with date fields reset the sequence each
/// period. Returns the raw sequence value and the formatted number.
pub async fn set_numbers(
    counters: &dyn CounterPort,
    regie: &Regie,
    date: NaiveDate,
    kind: CounterKind,
) -> Result<(u64, String), NumberingError> {
    let name = numbering::counter_name(regie, date)?;
    let number = counters.next_value(regie.id, &name, kind).await?;
    let formatted = numbering::format_number(regie, date, number, kind)?;
    Ok((number, formatted))
}
