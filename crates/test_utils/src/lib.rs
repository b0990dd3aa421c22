//! Shared test utilities for the billing pipeline workspace
//!
//! Provides the assembled in-memory test environment, data builders with
//! sensible defaults, pinned fixtures and scriptable mock ports.

pub mod builders;
pub mod env;
pub mod fixtures;
pub mod mocks;

pub use builders::{CampaignBuilder, RegieBuilder};
pub use env::TestEnv;
pub use fixtures::{AmountFixtures, TemporalFixtures};
pub use mocks::{Delivery, RecordingSink, StaticPricing};
