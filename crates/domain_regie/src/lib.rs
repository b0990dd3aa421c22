//! Regie Domain - billing units and document numbering
//!
//! A regie is the top-level scope for billing policy: it owns the counters
//! that number every document family, the payment types offered at its
//! counter, and the payer resolution configuration applied when journal
//! lines are created.
//!
//! # Numbering
//!
//! Counters are scoped by `(regie, name, kind)`. The counter name is rendered
//! from a per-regie template against the document date, so the default
//! `"{yy}"` template restarts sequences each year. Allocations are atomic and
//! never duplicated; gaps are tolerated.

pub mod counter;
pub mod export;
pub mod numbering;
pub mod payer;
pub mod regie;
pub mod store;

pub use counter::{set_numbers, CounterPort, NumberingError};
pub use export::{export_regie, import_regie, PaymentTypeExport, RegieExport};
pub use numbering::{counter_name, format_number, CounterKind, FormatError};
pub use payer::{payer_external_id, PayerError, PayerErrorReason};
pub use regie::{PaymentType, Regie, DEFAULT_PAYMENT_TYPES};
pub use store::{NewRegie, NumberFormats, RegieStore};
