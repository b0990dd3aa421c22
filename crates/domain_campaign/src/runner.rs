//! Job runner
//!
//! Driven by an external periodic scheduler, possibly from several processes
//! at once. Each tick claims at most one job: the oldest queued job whose
//! readiness predicate holds, claimed through an atomic conditional update
//! so concurrent runners never execute the same job. The claim transaction
//! is short; the batch work runs after it.

use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use core_kernel::{Clock, DraftInvoiceLineId, JournalLineId, StoreError};
use domain_ledger::{
    FinalizedDocument, JournalLine, LedgerService, LedgerStore, NewJournalLine,
};
use uuid::Uuid;

use crate::error::JobError;
use crate::generate;
use crate::job::{
    CampaignJob, CampaignJobAction, JobKind, JobStatus, PoolJob, PoolJobAction, QueuedJob,
};
use crate::pool::{Pool, PoolStatus};
use crate::pricing::PricingPort;
use crate::store::CampaignStore;

/// Orchestrator configuration, threaded in explicitly
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// System-wide cap on concurrently running jobs
    pub max_running_jobs: usize,
    /// How many line-generation jobs a campaign is split into
    pub pool_jobs_per_campaign: usize,
    /// Days a completed job is kept before garbage collection
    pub completed_job_retention_days: i64,
    /// Days a failed job is kept before garbage collection
    pub failed_job_retention_days: i64,
    /// Days after campaign finalization before old draft pools are pruned
    pub draft_pool_retention_days: i64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_running_jobs: 1,
            pool_jobs_per_campaign: 4,
            completed_job_retention_days: 2,
            failed_job_retention_days: 10,
            draft_pool_retention_days: 31,
        }
    }
}

pub struct JobRunner {
    campaigns: Arc<dyn CampaignStore>,
    ledger_store: Arc<dyn LedgerStore>,
    ledger: Arc<LedgerService>,
    pricing: Arc<dyn PricingPort>,
    clock: Arc<dyn Clock>,
    config: RunnerConfig,
}

impl JobRunner {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        ledger_store: Arc<dyn LedgerStore>,
        ledger: Arc<LedgerService>,
        pricing: Arc<dyn PricingPort>,
        clock: Arc<dyn Clock>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            campaigns,
            ledger_store,
            ledger,
            pricing,
            clock,
            config,
        }
    }

    /// Claims and executes the oldest ready job, if capacity allows
    ///
    /// Returns the executed job's id, or `None` when the running-job cap is
    /// reached or nothing is ready.
    pub async fn run_next_job(&self) -> Result<Option<Uuid>, StoreError> {
        if self.campaigns.running_jobs_count().await? >= self.config.max_running_jobs {
            return Ok(None);
        }

        for queued in self.campaigns.queued_jobs().await? {
            if !self.is_ready(&queued).await? {
                continue;
            }
            if !self.campaigns.claim_job(queued.uuid, self.clock.now()).await? {
                // another runner won this job
                continue;
            }
            match queued.kind {
                JobKind::Campaign => self.run_campaign_job(queued.uuid).await?,
                JobKind::Pool => self.run_pool_job(queued.uuid).await?,
            }
            return Ok(Some(queued.uuid));
        }

        Ok(None)
    }

    /// Runs jobs until nothing is ready; returns how many were executed
    pub async fn run_pending_jobs(&self) -> Result<usize, StoreError> {
        let mut executed = 0;
        while self.run_next_job().await?.is_some() {
            executed += 1;
        }
        Ok(executed)
    }

    /// Readiness gating for queued jobs
    ///
    /// A finalization pool job is not ready until its sibling generation
    /// jobs have settled; a corrective campaign's jobs are not ready until
    /// every job of the primary campaign completed.
    async fn is_ready(&self, queued: &QueuedJob) -> Result<bool, StoreError> {
        match queued.kind {
            JobKind::Campaign => {
                let job = self.campaigns.campaign_job(queued.uuid).await?;
                let campaign = self.campaigns.campaign(job.campaign_id).await?;
                if let Some(primary_id) = campaign.primary_campaign_id {
                    let primary_jobs =
                        self.campaigns.campaign_jobs_for_campaign(primary_id).await?;
                    if primary_jobs
                        .iter()
                        .any(|j| j.status != JobStatus::Completed)
                    {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            JobKind::Pool => {
                let job = self.campaigns.pool_job(queued.uuid).await?;
                if job.action != PoolJobAction::FinalizeInvoices {
                    return Ok(true);
                }
                let siblings = self
                    .campaigns
                    .pool_jobs_for(job.pool_id, job.campaign_job_uuid)
                    .await?;
                let generators: Vec<_> = siblings
                    .iter()
                    .filter(|j| j.action == PoolJobAction::GenerateInvoices)
                    .collect();
                if generators.is_empty() {
                    return Ok(true);
                }
                if generators.iter().any(|j| j.status == JobStatus::Failed) {
                    return Ok(true);
                }
                Ok(generators.iter().all(|j| j.status == JobStatus::Completed))
            }
        }
    }

    async fn run_campaign_job(&self, uuid: Uuid) -> Result<(), StoreError> {
        let mut job = self.campaigns.campaign_job(uuid).await?;
        let result = match job.action.clone() {
            CampaignJobAction::Generate { draft_pool_id } => {
                self.generate(&mut job, draft_pool_id).await
            }
            CampaignJobAction::AssignCredits => self.assign_credits(&mut job).await,
            CampaignJobAction::PopulateFromDraft {
                draft_pool_id,
                final_pool_id,
            } => {
                self.populate_from_draft(&mut job, draft_pool_id, final_pool_id)
                    .await
            }
        };

        self.settle_job_status(
            result,
            &mut job.status,
            &mut job.exception,
            &mut job.failure_label,
            &mut job.completion_timestamp,
            uuid,
        );
        self.campaigns
            .update_campaign_job(&job, self.clock.now())
            .await
    }

    async fn run_pool_job(&self, uuid: Uuid) -> Result<(), StoreError> {
        let mut job = self.campaigns.pool_job(uuid).await?;
        let result = match job.action {
            PoolJobAction::GenerateInvoices => self.generate_invoices(&mut job).await,
            PoolJobAction::FinalizeInvoices => self.finalize_invoices(&mut job).await,
        };

        self.settle_job_status(
            result,
            &mut job.status,
            &mut job.exception,
            &mut job.failure_label,
            &mut job.completion_timestamp,
            uuid,
        );
        self.campaigns.update_pool_job(&job, self.clock.now()).await
    }

    /// Maps an action's outcome onto the job state machine
    fn settle_job_status(
        &self,
        result: Result<(), JobError>,
        status: &mut JobStatus,
        exception: &mut String,
        failure_label: &mut String,
        completion_timestamp: &mut Option<chrono::DateTime<chrono::Utc>>,
        uuid: Uuid,
    ) {
        match result {
            Ok(()) => {
                if *status == JobStatus::Running {
                    *status = JobStatus::Completed;
                }
            }
            Err(JobError::WaitForOtherJobs) => {
                *status = JobStatus::Waiting;
            }
            Err(JobError::Abort(message)) => {
                *status = JobStatus::Failed;
                *exception = message.clone();
                *failure_label = format!("Error: {message}");
                warn!(job = %uuid, %message, "job aborted");
            }
            Err(err) => {
                *status = JobStatus::Failed;
                *exception = err.to_string();
                error!(job = %uuid, %err, "job failed");
            }
        }
        if status.is_terminal() {
            *completion_timestamp = Some(self.clock.now());
        }
    }

    // -- campaign job actions

    /// Splits the campaign's subscribed users into pool jobs
    async fn generate(
        &self,
        job: &mut CampaignJob,
        draft_pool_id: core_kernel::PoolId,
    ) -> Result<(), JobError> {
        let campaign = self.campaigns.campaign(job.campaign_id).await?;
        let pool = match self.campaigns.pool(draft_pool_id).await {
            Ok(pool) if pool.draft => pool,
            _ => return Err(JobError::abort("draft pool not found")),
        };
        if pool.status != PoolStatus::Registered {
            return Err(JobError::abort(format!(
                "pool wrong status {:?} (wanted: registered)",
                pool.status
            )));
        }

        let jobs_num = self.config.pool_jobs_per_campaign;
        job.total_count = (jobs_num + 2) as u32;
        self.campaigns
            .update_campaign_job(job, self.clock.now())
            .await?;

        let pool = self
            .campaigns
            .claim_pool(pool.id, PoolStatus::Registered, self.clock.now())
            .await?
            .ok_or_else(|| JobError::abort("pool wrong status (wanted: registered)"))?;

        let mut users = match self.pricing.users_for_period(&campaign).await {
            Ok(users) => users,
            Err(err) => {
                self.fail_pool(&pool, &err.to_string()).await?;
                return Err(err.into());
            }
        };
        users.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        self.increment(job).await?;

        let mut batches: Vec<Vec<domain_ledger::UserSnapshot>> = vec![Vec::new(); jobs_num];
        for (i, user) in users.into_iter().enumerate() {
            batches[i % jobs_num].push(user);
        }

        for batch in batches {
            if batch.is_empty() {
                self.increment(job).await?;
                continue;
            }
            self.campaigns
                .insert_pool_job(
                    pool.id,
                    Some(job.uuid),
                    PoolJobAction::GenerateInvoices,
                    batch,
                    self.clock.now(),
                )
                .await?;
            self.increment(job).await?;
        }

        self.campaigns
            .insert_pool_job(
                pool.id,
                Some(job.uuid),
                PoolJobAction::FinalizeInvoices,
                Vec::new(),
                self.clock.now(),
            )
            .await?;
        self.increment(job).await?;

        Ok(())
    }

    /// Assigns generated credits and invoices after campaign validation
    async fn assign_credits(&self, job: &mut CampaignJob) -> Result<(), JobError> {
        let campaign = self.campaigns.campaign(job.campaign_id).await?;
        if !campaign.finalized {
            return Err(JobError::abort("campaign not finalized"));
        }

        let today = self.clock.today();
        let mut invoices = Vec::new();
        let mut credits = Vec::new();
        for pool in self.campaigns.pools_for_campaign(campaign.id).await? {
            if pool.draft {
                continue;
            }
            for invoice in self.ledger_store.invoices_for_pool(pool.id).await? {
                if invoice.dates.due >= today && invoice.remaining_amount.is_positive() {
                    invoices.push(invoice);
                }
            }
            for credit in self.ledger_store.credits_for_pool(pool.id).await? {
                if credit.remaining_amount.is_positive() {
                    credits.push(credit);
                }
            }
        }

        job.total_count = (invoices.len() + credits.len()) as u32;
        self.campaigns
            .update_campaign_job(job, self.clock.now())
            .await?;

        // assign generated credits to existing invoices
        for invoice in invoices {
            self.ledger.assign_credits_for_invoice(invoice.id).await?;
            self.increment(job).await?;
        }
        // assign existing credits to generated invoices
        for credit in credits {
            self.ledger.assign_credits_for_credit(credit.id, true).await?;
            self.increment(job).await?;
        }

        Ok(())
    }

    /// Copies a completed draft pool into its final pool
    async fn populate_from_draft(
        &self,
        job: &mut CampaignJob,
        draft_pool_id: core_kernel::PoolId,
        final_pool_id: core_kernel::PoolId,
    ) -> Result<(), JobError> {
        let draft_pool = match self.campaigns.pool(draft_pool_id).await {
            Ok(pool) if pool.draft => pool,
            _ => return Err(JobError::abort("draft pool not found")),
        };
        if draft_pool.status != PoolStatus::Completed {
            return Err(JobError::abort(format!(
                "pool wrong status {:?} (wanted: completed)",
                draft_pool.status
            )));
        }
        let siblings = self.campaigns.pools_for_campaign(job.campaign_id).await?;
        if siblings.iter().any(|p| p.draft && p.id > draft_pool.id) {
            return Err(JobError::abort("more recent draft pool exists"));
        }
        let final_pool = match self.campaigns.pool(final_pool_id).await {
            Ok(pool) if !pool.draft => pool,
            _ => return Err(JobError::abort("final pool not found")),
        };
        let final_pool = self
            .campaigns
            .claim_pool(final_pool.id, PoolStatus::Registered, self.clock.now())
            .await?
            .ok_or_else(|| {
                JobError::abort("final pool wrong status (wanted: registered)")
            })?;

        let result = self
            .copy_draft_into_final(job, &draft_pool, &final_pool)
            .await;
        match result {
            Ok(()) => {
                let mut pool = self.campaigns.pool(final_pool.id).await?;
                if pool.is_running() {
                    pool.status = PoolStatus::Completed;
                }
                pool.completed_at = Some(self.clock.now());
                self.campaigns.update_pool(&pool, self.clock.now()).await?;
                info!(pool = %pool.id, "final pool completed");
                Ok(())
            }
            Err(err) => {
                self.fail_pool(&final_pool, &err.to_string()).await?;
                Err(err)
            }
        }
    }

    async fn copy_draft_into_final(
        &self,
        job: &mut CampaignJob,
        draft_pool: &Pool,
        final_pool: &Pool,
    ) -> Result<(), JobError> {
        let draft_lines = self
            .ledger_store
            .journal_lines_for_pool(draft_pool.id)
            .await?;
        let draft_invoices = self
            .ledger_store
            .draft_invoices_for_pool(draft_pool.id)
            .await?;
        job.total_count = (draft_lines.len() + draft_invoices.len()) as u32;
        self.campaigns
            .update_campaign_job(job, self.clock.now())
            .await?;

        // generate journal lines in the same order as drafts, keeping a
        // mapping from draft invoice lines to the final journal lines
        let mut final_lines: HashMap<JournalLineId, JournalLine> = HashMap::new();
        let mut by_draft_invoice_line: HashMap<DraftInvoiceLineId, Vec<JournalLineId>> =
            HashMap::new();
        for draft_line in &draft_lines {
            let final_line = self
                .ledger_store
                .insert_journal_line(
                    NewJournalLine {
                        pool_id: Some(final_pool.id),
                        data: draft_line.data.clone(),
                        error_status: None,
                    },
                    self.clock.now(),
                )
                .await?;
            if let Some(draft_invoice_line_id) = draft_line.draft_invoice_line_id {
                by_draft_invoice_line
                    .entry(draft_invoice_line_id)
                    .or_default()
                    .push(final_line.id);
            }
            final_lines.insert(final_line.id, final_line);
            self.increment(job).await?;
        }

        // promote draft invoices, then point the copied journal lines at the
        // final invoice/credit lines they produced
        for draft_invoice in draft_invoices {
            match self
                .ledger
                .finalize_draft_invoice(draft_invoice.id, Some(final_pool.id))
                .await?
            {
                FinalizedDocument::Invoice { line_map, .. } => {
                    for (draft_line_id, invoice_line_id) in line_map {
                        for journal_line_id in
                            by_draft_invoice_line.remove(&draft_line_id).unwrap_or_default()
                        {
                            if let Some(line) = final_lines.get_mut(&journal_line_id) {
                                line.invoice_line_id = Some(invoice_line_id);
                                self.ledger_store.update_journal_line(line).await?;
                            }
                        }
                    }
                }
                FinalizedDocument::Credit { line_map, .. } => {
                    for (draft_line_id, credit_line_id) in line_map {
                        for journal_line_id in
                            by_draft_invoice_line.remove(&draft_line_id).unwrap_or_default()
                        {
                            if let Some(line) = final_lines.get_mut(&journal_line_id) {
                                line.credit_line_id = Some(credit_line_id);
                                self.ledger_store.update_journal_line(line).await?;
                            }
                        }
                    }
                }
            }
            self.increment(job).await?;
        }

        Ok(())
    }

    // -- pool job actions

    /// Prices one batch of users into journal lines
    async fn generate_invoices(&self, job: &mut PoolJob) -> Result<(), JobError> {
        let pool = self.campaigns.pool(job.pool_id).await?;
        if !pool.draft {
            return Err(JobError::abort("pool is not draft"));
        }
        if !pool.is_running() {
            return Err(JobError::abort(format!(
                "pool wrong status {:?} (wanted: running)",
                pool.status
            )));
        }
        let campaign = self.campaigns.campaign(pool.campaign_id).await?;

        job.total_count = job.users.len() as u32;
        self.campaigns.update_pool_job(job, self.clock.now()).await?;

        let users = job.users.clone();
        for user in &users {
            if !self.campaigns.pool(pool.id).await?.is_running() {
                // pool failed elsewhere, stop quietly
                return Ok(());
            }
            let lines = match self.pricing.lines_for_user(&campaign, &pool, user).await {
                Ok(lines) => lines,
                Err(err) => {
                    self.fail_pool(&pool, &err.to_string()).await?;
                    return Err(err.into());
                }
            };
            for data in lines {
                self.ledger_store
                    .insert_journal_line(
                        NewJournalLine {
                            pool_id: Some(pool.id),
                            data,
                            error_status: None,
                        },
                        self.clock.now(),
                    )
                    .await?;
            }
            job.current_count += 1;
            self.campaigns.update_pool_job(job, self.clock.now()).await?;
        }

        Ok(())
    }

    /// Aggregates the pool's lines into draft documents and completes it
    async fn finalize_invoices(&self, job: &mut PoolJob) -> Result<(), JobError> {
        let pool = self.campaigns.pool(job.pool_id).await?;
        if !pool.draft {
            return Err(JobError::abort("pool is not draft"));
        }
        if !pool.is_running() {
            return Err(JobError::abort(format!(
                "pool wrong status {:?} (wanted: running)",
                pool.status
            )));
        }

        let siblings = self
            .campaigns
            .pool_jobs_for(pool.id, job.campaign_job_uuid)
            .await?;
        for sibling in siblings
            .iter()
            .filter(|j| j.action == PoolJobAction::GenerateInvoices)
        {
            if sibling.status == JobStatus::Failed {
                // normally the pool is already failed, belt and braces
                return Err(JobError::abort("a pool job has failed, stop campaign"));
            }
            if sibling.status != JobStatus::Completed {
                return Err(JobError::WaitForOtherJobs);
            }
        }

        let campaign = self.campaigns.campaign(pool.campaign_id).await?;
        let result: Result<(), JobError> = async {
            generate::expand_injected_lines(
                &*self.ledger_store,
                &campaign,
                &pool,
                self.clock.now(),
            )
            .await?;
            let documents = generate::generate_draft_documents(
                &*self.ledger_store,
                &campaign,
                &pool,
                self.clock.now(),
            )
            .await?;
            job.total_count = documents.len() as u32;
            job.current_count = documents.len() as u32;
            self.campaigns.update_pool_job(job, self.clock.now()).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                let mut pool = self.campaigns.pool(pool.id).await?;
                if pool.is_running() {
                    pool.status = PoolStatus::Completed;
                }
                pool.completed_at = Some(self.clock.now());
                self.campaigns.update_pool(&pool, self.clock.now()).await?;
                info!(pool = %pool.id, "draft pool completed");
                Ok(())
            }
            Err(err) => {
                self.fail_pool(&pool, &err.to_string()).await?;
                Err(err)
            }
        }
    }

    // -- maintenance

    /// Garbage-collects terminal jobs past their retention windows
    pub async fn gc_jobs(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let completed_cutoff = now - Duration::days(self.config.completed_job_retention_days);
        let failed_cutoff = now - Duration::days(self.config.failed_job_retention_days);
        let removed = self
            .campaigns
            .delete_old_jobs(completed_cutoff, failed_cutoff)
            .await?;
        if removed > 0 {
            info!(removed, "garbage-collected jobs");
        }
        Ok(removed)
    }

    /// Prunes old draft pools of long-finalized campaigns
    ///
    /// Only campaigns with more than one draft pool are touched, and the
    /// most recent draft pool is always kept.
    pub async fn clean_draft_pools(&self) -> Result<usize, StoreError> {
        let cutoff = self.clock.now() - Duration::days(self.config.draft_pool_retention_days);
        let mut removed = 0;
        for campaign in self.campaigns.campaigns_finalized_before(cutoff).await? {
            let mut drafts: Vec<Pool> = self
                .campaigns
                .pools_for_campaign(campaign.id)
                .await?
                .into_iter()
                .filter(|p| p.draft)
                .collect();
            if drafts.len() <= 1 {
                continue;
            }
            drafts.pop();
            for pool in drafts {
                self.ledger_store
                    .delete_draft_documents_for_pool(pool.id)
                    .await?;
                self.campaigns.delete_pool(pool.id).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "pruned draft pools");
        }
        Ok(removed)
    }

    // -- helpers

    async fn fail_pool(&self, pool: &Pool, exception: &str) -> Result<(), StoreError> {
        let mut pool = self.campaigns.pool(pool.id).await?;
        pool.status = PoolStatus::Failed;
        pool.exception = exception.to_string();
        pool.completed_at = Some(self.clock.now());
        self.campaigns.update_pool(&pool, self.clock.now()).await?;
        error!(pool = %pool.id, exception, "pool failed");
        Ok(())
    }

    async fn increment(&self, job: &mut CampaignJob) -> Result<(), StoreError> {
        job.current_count += 1;
        self.campaigns.update_campaign_job(job, self.clock.now()).await
    }
}
