//! Common fixtures
//!
//! Pinned dates and amounts used across the test suite.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use core_kernel::Amount;

/// Temporal fixtures: a September 2022 campaign period
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// The pinned "now" most tests start from
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 9, 1, 9, 0, 0).unwrap()
    }

    pub fn period_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 9, 1).unwrap()
    }

    pub fn period_end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 10, 1).unwrap()
    }

    pub fn publication() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 10, 1).unwrap()
    }

    pub fn payment_deadline() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 10, 31).unwrap()
    }

    pub fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 11, 30).unwrap()
    }

    pub fn debit() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 11, 15).unwrap()
    }
}

/// Amount fixtures
pub struct AmountFixtures;

impl AmountFixtures {
    pub fn euros(euros: i64) -> Amount {
        Amount::from_cents(euros * 100)
    }

    pub fn cents(cents: i64) -> Amount {
        Amount::from_cents(cents)
    }
}
