//! Pools
//!
//! A pool is one execution batch within a campaign: draft pools preview,
//! the final pool produces real documents. At most one pool of a campaign
//! runs at a time; that exclusion is enforced by the job runner's claim,
//! not by the pool itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CampaignId, PoolId};

/// Pool lifecycle states
///
/// `Failed` is terminal: failed pools are never retried, an operator
/// triggers a fresh pool instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Registered,
    Running,
    Failed,
    Completed,
}

/// One execution batch of a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub campaign_id: CampaignId,
    /// Preview batch vs the real run
    pub draft: bool,
    pub status: PoolStatus,
    pub completed_at: Option<DateTime<Utc>>,
    /// Rendered description of the failure that ended the pool
    pub exception: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pool {
    pub fn is_completed(&self) -> bool {
        self.status == PoolStatus::Completed
    }

    pub fn is_running(&self) -> bool {
        self.status == PoolStatus::Running
    }
}

/// Why a draft pool cannot be promoted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolPromotionError {
    #[error("pool too old")]
    NotLast,

    #[error("pool is final")]
    NotDraft,

    #[error("pool is not completed")]
    NotCompleted,
}
