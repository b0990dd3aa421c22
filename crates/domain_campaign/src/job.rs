//! Asynchronous jobs
//!
//! Campaign jobs drive pool creation across a campaign; pool jobs process
//! one pool's lines. Jobs are claimed atomically by the runner, park
//! themselves `Waiting` when their dependencies are not settled yet, and
//! carry progress counters for operator visibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{CampaignId, PoolId};
use domain_ledger::UserSnapshot;

/// Job lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Registered,
    Waiting,
    Running,
    Failed,
    Completed,
}

impl JobStatus {
    /// States the runner may claim from
    pub fn is_claimable(&self) -> bool {
        matches!(self, JobStatus::Registered | JobStatus::Waiting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// What a campaign job does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CampaignJobAction {
    /// Prepare invoice generation: split users into pool jobs
    Generate { draft_pool_id: PoolId },
    /// Assign generated credits and invoices after campaign validation
    AssignCredits,
    /// Copy a completed draft pool into its final pool
    PopulateFromDraft {
        draft_pool_id: PoolId,
        final_pool_id: PoolId,
    },
}

impl CampaignJobAction {
    pub fn label(&self) -> &'static str {
        match self {
            CampaignJobAction::Generate { .. } => "Invoices generation preparation",
            CampaignJobAction::AssignCredits => "Campaign validation",
            CampaignJobAction::PopulateFromDraft { .. } => "Invoices generation",
        }
    }
}

/// What a pool job does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PoolJobAction {
    /// Price one batch of users into journal lines
    GenerateInvoices,
    /// Aggregate the pool's journal lines into draft documents
    FinalizeInvoices,
}

impl PoolJobAction {
    pub fn label(&self) -> &'static str {
        match self {
            PoolJobAction::GenerateInvoices => "Invoice lines generation",
            PoolJobAction::FinalizeInvoices => "Invoices finalization",
        }
    }
}

/// A job driving pool creation for one campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignJob {
    pub uuid: Uuid,
    pub campaign_id: CampaignId,
    pub action: CampaignJobAction,
    pub status: JobStatus,
    pub exception: String,
    pub failure_label: String,
    pub total_count: u32,
    pub current_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_update_timestamp: DateTime<Utc>,
    pub completion_timestamp: Option<DateTime<Utc>>,
}

/// A job processing one pool's lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolJob {
    pub uuid: Uuid,
    pub pool_id: PoolId,
    /// The campaign job that spawned this one
    pub campaign_job_uuid: Option<Uuid>,
    pub action: PoolJobAction,
    /// User batch for line generation
    pub users: Vec<UserSnapshot>,
    pub status: JobStatus,
    pub exception: String,
    pub failure_label: String,
    pub total_count: u32,
    pub current_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_update_timestamp: DateTime<Utc>,
    pub completion_timestamp: Option<DateTime<Utc>>,
}

/// Progress display shared by both job kinds
pub fn progression(current_count: u32, total_count: u32) -> String {
    if current_count == 0 {
        return String::new();
    }
    if total_count == 0 {
        return format!("{current_count} (unknown total)");
    }
    let percent = current_count as u64 * 100 / total_count as u64;
    format!("{current_count}/{total_count} ({percent}%)")
}

/// A queued job reference, ordered by creation for scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedJob {
    pub uuid: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Campaign,
    Pool,
}
