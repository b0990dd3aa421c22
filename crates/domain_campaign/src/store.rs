//! Campaign persistence port
//!
//! Claims are the concurrency primitive here too: `claim_job` and
//! `claim_pool` are atomic conditional updates so that exactly one of any
//! number of concurrent runners proceeds with a given job or pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use core_kernel::{CampaignId, PoolId, StoreError};
use domain_ledger::UserSnapshot;

use crate::campaign::{Campaign, NewCampaign};
use crate::job::{CampaignJob, CampaignJobAction, PoolJob, PoolJobAction, QueuedJob};
use crate::pool::{Pool, PoolStatus};

#[async_trait]
pub trait CampaignStore: Send + Sync {
    // -- campaigns

    async fn insert_campaign(
        &self,
        campaign: NewCampaign,
        now: DateTime<Utc>,
    ) -> Result<Campaign, StoreError>;

    async fn campaign(&self, id: CampaignId) -> Result<Campaign, StoreError>;

    async fn update_campaign(&self, campaign: &Campaign, now: DateTime<Utc>)
        -> Result<(), StoreError>;

    /// Corrective campaigns of a primary, in id order
    async fn corrective_campaigns(
        &self,
        primary_id: CampaignId,
    ) -> Result<Vec<Campaign>, StoreError>;

    /// Campaigns finalized before the cutoff, for draft pool retention
    async fn campaigns_finalized_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, StoreError>;

    // -- pools

    async fn insert_pool(
        &self,
        campaign_id: CampaignId,
        draft: bool,
        now: DateTime<Utc>,
    ) -> Result<Pool, StoreError>;

    async fn pool(&self, id: PoolId) -> Result<Pool, StoreError>;

    async fn update_pool(&self, pool: &Pool, now: DateTime<Utc>) -> Result<(), StoreError>;

    /// Pools of a campaign in id order
    async fn pools_for_campaign(&self, campaign_id: CampaignId) -> Result<Vec<Pool>, StoreError>;

    /// Atomically moves a pool from `from` to `Running`; `None` when another
    /// caller won or the pool is in a different state
    async fn claim_pool(
        &self,
        id: PoolId,
        from: PoolStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Pool>, StoreError>;

    /// Deletes a pool row (its draft documents are removed separately)
    async fn delete_pool(&self, id: PoolId) -> Result<(), StoreError>;

    // -- jobs

    async fn insert_campaign_job(
        &self,
        campaign_id: CampaignId,
        action: CampaignJobAction,
        now: DateTime<Utc>,
    ) -> Result<CampaignJob, StoreError>;

    async fn campaign_job(&self, uuid: Uuid) -> Result<CampaignJob, StoreError>;

    async fn update_campaign_job(
        &self,
        job: &CampaignJob,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Campaign jobs of a campaign in creation order
    async fn campaign_jobs_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignJob>, StoreError>;

    async fn insert_pool_job(
        &self,
        pool_id: PoolId,
        campaign_job_uuid: Option<Uuid>,
        action: PoolJobAction,
        users: Vec<UserSnapshot>,
        now: DateTime<Utc>,
    ) -> Result<PoolJob, StoreError>;

    async fn pool_job(&self, uuid: Uuid) -> Result<PoolJob, StoreError>;

    async fn update_pool_job(&self, job: &PoolJob, now: DateTime<Utc>) -> Result<(), StoreError>;

    /// Pool jobs of a pool spawned by one campaign job, in creation order
    async fn pool_jobs_for(
        &self,
        pool_id: PoolId,
        campaign_job_uuid: Option<Uuid>,
    ) -> Result<Vec<PoolJob>, StoreError>;

    // -- scheduling

    /// Jobs of either kind currently `Running`
    async fn running_jobs_count(&self) -> Result<usize, StoreError>;

    /// Jobs of either kind in `Registered` or `Waiting`, oldest first
    async fn queued_jobs(&self) -> Result<Vec<QueuedJob>, StoreError>;

    /// Atomically moves a claimable job (`Registered` or `Waiting`) to
    /// `Running`; false when another runner won
    async fn claim_job(&self, uuid: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Garbage-collects terminal jobs by `last_update_timestamp`: completed
    /// jobs before `completed_cutoff`, failed jobs before `failed_cutoff`.
    /// Returns how many were removed.
    async fn delete_old_jobs(
        &self,
        completed_cutoff: DateTime<Utc>,
        failed_cutoff: DateTime<Utc>,
    ) -> Result<usize, StoreError>;
}
