//! Campaign operations
//!
//! Operator-facing entrypoints: creating campaigns, launching previews,
//! promoting an accepted preview into the final run, and validating the
//! campaign. Each long-running step is recorded as a job picked up by the
//! runner.

use std::sync::Arc;
use tracing::info;

use core_kernel::{CampaignId, Clock, PoolId};

use crate::campaign::{Campaign, NewCampaign};
use crate::error::CampaignError;
use crate::job::{CampaignJob, CampaignJobAction};
use crate::pool::{Pool, PoolPromotionError};
use crate::store::CampaignStore;

pub struct CampaignService {
    store: Arc<dyn CampaignStore>,
    clock: Arc<dyn Clock>,
}

impl CampaignService {
    pub fn new(store: Arc<dyn CampaignStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates a campaign
    ///
    /// Corrective campaigns reference a primary campaign; the hierarchy is
    /// one level deep, so a corrective campaign cannot itself be corrected.
    pub async fn create_campaign(&self, campaign: NewCampaign) -> Result<Campaign, CampaignError> {
        if campaign.date_start >= campaign.date_end {
            return Err(CampaignError::invalid("period start must precede its end"));
        }
        if let Some(primary_id) = campaign.primary_campaign_id {
            let primary = self.store.campaign(primary_id).await?;
            if primary.is_corrective() {
                return Err(CampaignError::invalid(
                    "a corrective campaign cannot correct another corrective campaign",
                ));
            }
        }
        let campaign = self.store.insert_campaign(campaign, self.clock.now()).await?;
        info!(campaign = %campaign.id, label = %campaign.label, "campaign created");
        Ok(campaign)
    }

    /// Launches a preview: a fresh draft pool and its generation job
    pub async fn generate(
        &self,
        campaign_id: CampaignId,
    ) -> Result<(Pool, CampaignJob), CampaignError> {
        let campaign = self.store.campaign(campaign_id).await?;
        let pool = self
            .store
            .insert_pool(campaign.id, true, self.clock.now())
            .await?;
        let job = self
            .store
            .insert_campaign_job(
                campaign.id,
                CampaignJobAction::Generate {
                    draft_pool_id: pool.id,
                },
                self.clock.now(),
            )
            .await?;
        info!(campaign = %campaign.id, pool = %pool.id, "draft pool registered");
        Ok((pool, job))
    }

    /// Promotes an accepted draft pool into a final pool
    ///
    /// Only the campaign's most recent draft pool can be promoted, and only
    /// once completed.
    pub async fn promote_pool(
        &self,
        pool_id: PoolId,
    ) -> Result<(Pool, CampaignJob), CampaignError> {
        let pool = self.store.pool(pool_id).await?;
        let siblings = self.store.pools_for_campaign(pool.campaign_id).await?;
        if siblings.iter().any(|p| p.id > pool.id) {
            return Err(PoolPromotionError::NotLast.into());
        }
        if !pool.draft {
            return Err(PoolPromotionError::NotDraft.into());
        }
        if !pool.is_completed() {
            return Err(PoolPromotionError::NotCompleted.into());
        }

        let final_pool = self
            .store
            .insert_pool(pool.campaign_id, false, self.clock.now())
            .await?;
        let job = self
            .store
            .insert_campaign_job(
                pool.campaign_id,
                CampaignJobAction::PopulateFromDraft {
                    draft_pool_id: pool.id,
                    final_pool_id: final_pool.id,
                },
                self.clock.now(),
            )
            .await?;
        info!(pool = %pool.id, final_pool = %final_pool.id, "draft pool promoted");
        Ok((final_pool, job))
    }

    /// Marks the campaign finalized and schedules credit assignment
    pub async fn mark_as_finalized(
        &self,
        campaign_id: CampaignId,
    ) -> Result<CampaignJob, CampaignError> {
        let mut campaign = self.store.campaign(campaign_id).await?;
        campaign.finalized = true;
        campaign.finalized_at = Some(self.clock.now());
        self.store
            .update_campaign(&campaign, self.clock.now())
            .await?;
        let job = self
            .store
            .insert_campaign_job(
                campaign.id,
                CampaignJobAction::AssignCredits,
                self.clock.now(),
            )
            .await?;
        info!(campaign = %campaign.id, "campaign finalized");
        Ok(job)
    }

    pub async fn mark_as_valid(&self, campaign_id: CampaignId) -> Result<(), CampaignError> {
        let mut campaign = self.store.campaign(campaign_id).await?;
        campaign.invalid = false;
        self.store
            .update_campaign(&campaign, self.clock.now())
            .await?;
        Ok(())
    }

    pub async fn mark_as_invalid(&self, campaign_id: CampaignId) -> Result<(), CampaignError> {
        let mut campaign = self.store.campaign(campaign_id).await?;
        campaign.invalid = true;
        self.store
            .update_campaign(&campaign, self.clock.now())
            .await?;
        Ok(())
    }

    /// Whether this campaign is the latest of its corrective chain
    pub async fn is_last(&self, campaign: &Campaign) -> Result<bool, CampaignError> {
        match campaign.primary_campaign_id {
            None => {
                let correctives = self.store.corrective_campaigns(campaign.id).await?;
                Ok(correctives.is_empty())
            }
            Some(primary_id) => {
                let siblings = self.store.corrective_campaigns(primary_id).await?;
                Ok(!siblings.iter().any(|c| c.id > campaign.id))
            }
        }
    }
}
