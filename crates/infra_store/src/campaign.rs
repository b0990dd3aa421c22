//! Campaign port implementation
//!
//! Job and pool claims are conditional updates under the table lock,
//! the store-level equivalent of `UPDATE ... WHERE status = ... RETURNING`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use core_kernel::{CampaignId, PoolId, StoreError};
use domain_campaign::{
    Campaign, CampaignJob, CampaignJobAction, CampaignStore, JobKind, JobStatus, NewCampaign,
    Pool, PoolJob, PoolJobAction, PoolStatus, QueuedJob,
};
use domain_ledger::UserSnapshot;

use crate::memory::MemoryStore;

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn insert_campaign(
        &self,
        campaign: NewCampaign,
        now: DateTime<Utc>,
    ) -> Result<Campaign, StoreError> {
        let mut tables = self.lock();
        if let Some(primary_id) = campaign.primary_campaign_id {
            if !tables.campaigns.contains_key(&primary_id.value()) {
                return Err(StoreError::not_found("Campaign", primary_id));
            }
        }
        let id = tables.next_id("campaigns");
        let row = Campaign {
            id: CampaignId::new(id),
            regie_id: campaign.regie_id,
            label: campaign.label,
            date_start: campaign.date_start,
            date_end: campaign.date_end,
            date_publication: campaign.date_publication,
            date_payment_deadline_displayed: campaign.date_payment_deadline_displayed,
            date_payment_deadline: campaign.date_payment_deadline,
            date_due: campaign.date_due,
            date_debit: campaign.date_debit,
            injected_lines: campaign.injected_lines,
            adjustment_campaign: campaign.adjustment_campaign,
            invalid: false,
            finalized: false,
            finalized_at: None,
            primary_campaign_id: campaign.primary_campaign_id,
            created_at: now,
            updated_at: now,
        };
        tables.campaigns.insert(id, row.clone());
        Ok(row)
    }

    async fn campaign(&self, id: CampaignId) -> Result<Campaign, StoreError> {
        self.lock()
            .campaigns
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("Campaign", id))
    }

    async fn update_campaign(
        &self,
        campaign: &Campaign,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let id = campaign.id.value();
        if !tables.campaigns.contains_key(&id) {
            return Err(StoreError::not_found("Campaign", campaign.id));
        }
        let mut updated = campaign.clone();
        updated.updated_at = now;
        tables.campaigns.insert(id, updated);
        Ok(())
    }

    async fn corrective_campaigns(
        &self,
        primary_id: CampaignId,
    ) -> Result<Vec<Campaign>, StoreError> {
        Ok(self
            .lock()
            .campaigns
            .values()
            .filter(|c| c.primary_campaign_id == Some(primary_id))
            .cloned()
            .collect())
    }

    async fn campaigns_finalized_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, StoreError> {
        Ok(self
            .lock()
            .campaigns
            .values()
            .filter(|c| c.finalized_at.map(|at| at < cutoff).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn insert_pool(
        &self,
        campaign_id: CampaignId,
        draft: bool,
        now: DateTime<Utc>,
    ) -> Result<Pool, StoreError> {
        let mut tables = self.lock();
        if !tables.campaigns.contains_key(&campaign_id.value()) {
            return Err(StoreError::not_found("Campaign", campaign_id));
        }
        let id = tables.next_id("pools");
        let pool = Pool {
            id: PoolId::new(id),
            campaign_id,
            draft,
            status: PoolStatus::Registered,
            completed_at: None,
            exception: String::new(),
            created_at: now,
            updated_at: now,
        };
        tables.pools.insert(id, pool.clone());
        Ok(pool)
    }

    async fn pool(&self, id: PoolId) -> Result<Pool, StoreError> {
        self.lock()
            .pools
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("Pool", id))
    }

    async fn update_pool(&self, pool: &Pool, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let id = pool.id.value();
        if !tables.pools.contains_key(&id) {
            return Err(StoreError::not_found("Pool", pool.id));
        }
        let mut updated = pool.clone();
        updated.updated_at = now;
        tables.pools.insert(id, updated);
        Ok(())
    }

    async fn pools_for_campaign(&self, campaign_id: CampaignId) -> Result<Vec<Pool>, StoreError> {
        Ok(self
            .lock()
            .pools
            .values()
            .filter(|p| p.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn claim_pool(
        &self,
        id: PoolId,
        from: PoolStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Pool>, StoreError> {
        let mut tables = self.lock();
        let pool = tables
            .pools
            .get_mut(&id.value())
            .ok_or_else(|| StoreError::not_found("Pool", id))?;
        if pool.status != from {
            return Ok(None);
        }
        pool.status = PoolStatus::Running;
        pool.updated_at = now;
        Ok(Some(pool.clone()))
    }

    async fn delete_pool(&self, id: PoolId) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if tables.pools.remove(&id.value()).is_none() {
            return Err(StoreError::not_found("Pool", id));
        }
        Ok(())
    }

    async fn insert_campaign_job(
        &self,
        campaign_id: CampaignId,
        action: CampaignJobAction,
        now: DateTime<Utc>,
    ) -> Result<CampaignJob, StoreError> {
        let mut tables = self.lock();
        if !tables.campaigns.contains_key(&campaign_id.value()) {
            return Err(StoreError::not_found("Campaign", campaign_id));
        }
        let seq = tables.next_id("jobs");
        let job = CampaignJob {
            uuid: Uuid::new_v4(),
            campaign_id,
            action,
            status: JobStatus::Registered,
            exception: String::new(),
            failure_label: String::new(),
            total_count: 0,
            current_count: 0,
            created_at: now,
            last_update_timestamp: now,
            completion_timestamp: None,
        };
        tables.campaign_job_index.insert(job.uuid, seq);
        tables.campaign_jobs.insert(seq, job.clone());
        Ok(job)
    }

    async fn campaign_job(&self, uuid: Uuid) -> Result<CampaignJob, StoreError> {
        let tables = self.lock();
        tables
            .campaign_job_index
            .get(&uuid)
            .and_then(|seq| tables.campaign_jobs.get(seq))
            .cloned()
            .ok_or_else(|| StoreError::not_found("CampaignJob", uuid))
    }

    async fn update_campaign_job(
        &self,
        job: &CampaignJob,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let seq = *tables
            .campaign_job_index
            .get(&job.uuid)
            .ok_or_else(|| StoreError::not_found("CampaignJob", job.uuid))?;
        let mut updated = job.clone();
        updated.last_update_timestamp = now;
        tables.campaign_jobs.insert(seq, updated);
        Ok(())
    }

    async fn campaign_jobs_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignJob>, StoreError> {
        Ok(self
            .lock()
            .campaign_jobs
            .values()
            .filter(|j| j.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn insert_pool_job(
        &self,
        pool_id: PoolId,
        campaign_job_uuid: Option<Uuid>,
        action: PoolJobAction,
        users: Vec<UserSnapshot>,
        now: DateTime<Utc>,
    ) -> Result<PoolJob, StoreError> {
        let mut tables = self.lock();
        if !tables.pools.contains_key(&pool_id.value()) {
            return Err(StoreError::not_found("Pool", pool_id));
        }
        let seq = tables.next_id("jobs");
        let job = PoolJob {
            uuid: Uuid::new_v4(),
            pool_id,
            campaign_job_uuid,
            action,
            users,
            status: JobStatus::Registered,
            exception: String::new(),
            failure_label: String::new(),
            total_count: 0,
            current_count: 0,
            created_at: now,
            last_update_timestamp: now,
            completion_timestamp: None,
        };
        tables.pool_job_index.insert(job.uuid, seq);
        tables.pool_jobs.insert(seq, job.clone());
        Ok(job)
    }

    async fn pool_job(&self, uuid: Uuid) -> Result<PoolJob, StoreError> {
        let tables = self.lock();
        tables
            .pool_job_index
            .get(&uuid)
            .and_then(|seq| tables.pool_jobs.get(seq))
            .cloned()
            .ok_or_else(|| StoreError::not_found("PoolJob", uuid))
    }

    async fn update_pool_job(&self, job: &PoolJob, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let seq = *tables
            .pool_job_index
            .get(&job.uuid)
            .ok_or_else(|| StoreError::not_found("PoolJob", job.uuid))?;
        let mut updated = job.clone();
        updated.last_update_timestamp = now;
        tables.pool_jobs.insert(seq, updated);
        Ok(())
    }

    async fn pool_jobs_for(
        &self,
        pool_id: PoolId,
        campaign_job_uuid: Option<Uuid>,
    ) -> Result<Vec<PoolJob>, StoreError> {
        Ok(self
            .lock()
            .pool_jobs
            .values()
            .filter(|j| j.pool_id == pool_id && j.campaign_job_uuid == campaign_job_uuid)
            .cloned()
            .collect())
    }

    async fn running_jobs_count(&self) -> Result<usize, StoreError> {
        let tables = self.lock();
        let campaign_running = tables
            .campaign_jobs
            .values()
            .filter(|j| j.status == JobStatus::Running)
            .count();
        let pool_running = tables
            .pool_jobs
            .values()
            .filter(|j| j.status == JobStatus::Running)
            .count();
        Ok(campaign_running + pool_running)
    }

    async fn queued_jobs(&self) -> Result<Vec<QueuedJob>, StoreError> {
        let tables = self.lock();
        let mut queued: Vec<(u64, QueuedJob)> = Vec::new();
        for (seq, job) in &tables.campaign_jobs {
            if job.status.is_claimable() {
                queued.push((
                    *seq,
                    QueuedJob {
                        uuid: job.uuid,
                        kind: JobKind::Campaign,
                        status: job.status,
                        created_at: job.created_at,
                    },
                ));
            }
        }
        for (seq, job) in &tables.pool_jobs {
            if job.status.is_claimable() {
                queued.push((
                    *seq,
                    QueuedJob {
                        uuid: job.uuid,
                        kind: JobKind::Pool,
                        status: job.status,
                        created_at: job.created_at,
                    },
                ));
            }
        }
        // creation order: the shared job sequence breaks timestamp ties
        queued.sort_by_key(|(seq, job)| (job.created_at, *seq));
        Ok(queued.into_iter().map(|(_, job)| job).collect())
    }

    async fn claim_job(&self, uuid: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        if let Some(seq) = tables.campaign_job_index.get(&uuid).copied() {
            if let Some(job) = tables.campaign_jobs.get_mut(&seq) {
                if job.status.is_claimable() {
                    job.status = JobStatus::Running;
                    job.last_update_timestamp = now;
                    return Ok(true);
                }
                return Ok(false);
            }
        }
        if let Some(seq) = tables.pool_job_index.get(&uuid).copied() {
            if let Some(job) = tables.pool_jobs.get_mut(&seq) {
                if job.status.is_claimable() {
                    job.status = JobStatus::Running;
                    job.last_update_timestamp = now;
                    return Ok(true);
                }
                return Ok(false);
            }
        }
        Err(StoreError::not_found("Job", uuid))
    }

    async fn delete_old_jobs(
        &self,
        completed_cutoff: DateTime<Utc>,
        failed_cutoff: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut tables = self.lock();
        let expired = |status: JobStatus, last_update: DateTime<Utc>| match status {
            JobStatus::Completed => last_update < completed_cutoff,
            JobStatus::Failed => last_update < failed_cutoff,
            _ => false,
        };

        let before = tables.campaign_jobs.len() + tables.pool_jobs.len();
        let removed_campaign: Vec<Uuid> = tables
            .campaign_jobs
            .values()
            .filter(|j| expired(j.status, j.last_update_timestamp))
            .map(|j| j.uuid)
            .collect();
        tables
            .campaign_jobs
            .retain(|_, j| !expired(j.status, j.last_update_timestamp));
        for uuid in removed_campaign {
            tables.campaign_job_index.remove(&uuid);
        }
        let removed_pool: Vec<Uuid> = tables
            .pool_jobs
            .values()
            .filter(|j| expired(j.status, j.last_update_timestamp))
            .map(|j| j.uuid)
            .collect();
        tables
            .pool_jobs
            .retain(|_, j| !expired(j.status, j.last_update_timestamp));
        for uuid in removed_pool {
            tables.pool_job_index.remove(&uuid);
        }
        Ok(before - (tables.campaign_jobs.len() + tables.pool_jobs.len()))
    }
}
