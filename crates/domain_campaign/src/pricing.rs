//! Pricing port
//!
//! Pricing is an external collaborator: given a campaign period and a user,
//! it produces the priced journal line data for every billable event. Lines
//! that failed to price come back with an error status and their reason in
//! the pricing data; they never abort the pool. A port-level error is fatal
//! to the job that called it.

use async_trait::async_trait;
use thiserror::Error;

use domain_ledger::{JournalLineData, UserSnapshot};

use crate::campaign::Campaign;
use crate::pool::Pool;

/// Fatal pricing engine failure
#[derive(Debug, Clone, Error)]
#[error("pricing engine error: {0}")]
pub struct PricingError(pub String);

/// The external pricing engine
#[async_trait]
pub trait PricingPort: Send + Sync {
    /// The users subscribed to billable activity during the campaign period
    async fn users_for_period(
        &self,
        campaign: &Campaign,
    ) -> Result<Vec<UserSnapshot>, PricingError>;

    /// Priced journal line data for one user over the campaign period
    async fn lines_for_user(
        &self,
        campaign: &Campaign,
        pool: &Pool,
        user: &UserSnapshot,
    ) -> Result<Vec<JournalLineData>, PricingError>;
}
