//! Strongly-typed identifiers for domain entities
//!
//! Newtype wrappers around row identifiers prevent accidental mixing of
//! different entity ids. Identifiers are allocated by the store in strictly
//! ascending order per table, so id order is creation order: the ordering
//! the payment-allocation and promotion algorithms rely on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw row identifier
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw row identifier
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }
    };
}

// Regie domain identifiers
define_id!(RegieId);
define_id!(PaymentTypeId);

// Campaign domain identifiers
define_id!(CampaignId);
define_id!(PoolId);

// Ledger domain identifiers
define_id!(InjectedLineId);
define_id!(JournalLineId);
define_id!(DraftInvoiceId);
define_id!(DraftInvoiceLineId);
define_id!(InvoiceId);
define_id!(InvoiceLineId);
define_id!(CreditId);
define_id!(CreditLineId);
define_id!(PaymentId);
define_id!(InvoiceLinePaymentId);
define_id!(CreditAssignmentId);
define_id!(RefundId);
define_id!(PaymentDocketId);
define_id!(CollectionDocketId);
define_id!(InvoiceCancellationReasonId);
define_id!(PaymentCancellationReasonId);
define_id!(CreditCancellationReasonId);

// Notification identifiers
define_id!(CallbackId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let id = InvoiceId::new(42);
        assert_eq!(id.to_string(), "42");
        let parsed: InvoiceId = "42".parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_ordering_follows_allocation_order() {
        assert!(InvoiceLineId::new(1) < InvoiceLineId::new(2));
    }

    #[test]
    fn test_raw_conversion() {
        let id = PaymentId::from(7u64);
        let raw: u64 = id.into();
        assert_eq!(raw, 7);
    }
}
