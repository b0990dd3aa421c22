//! Campaign Domain - the asynchronous invoicing orchestrator
//!
//! A campaign covers one billing period. Previewing it spawns a draft pool
//! processed by a chain of jobs: a campaign job splits the subscribed users
//! into line-generation pool jobs, and a finalization pool job aggregates
//! the resulting journal lines into per-payer draft documents. Promoting an
//! accepted draft pool copies it into a final pool whose documents are
//! numbered and become real invoices and credits.
//!
//! # Scheduling model
//!
//! No in-process concurrency: an external periodic scheduler, possibly
//! running in several processes at once, calls [`JobRunner::run_next_job`],
//! and correctness rests on the store's atomic claim updates. Failed pools
//! and jobs are terminal; operators re-trigger fresh ones.

pub mod campaign;
pub mod error;
pub mod generate;
pub mod job;
pub mod pool;
pub mod pricing;
pub mod runner;
pub mod service;
pub mod store;

pub use campaign::{Campaign, InjectedLinesMode, NewCampaign};
pub use error::{CampaignError, JobError};
pub use job::{
    progression, CampaignJob, CampaignJobAction, JobKind, JobStatus, PoolJob, PoolJobAction,
    QueuedJob,
};
pub use pool::{Pool, PoolPromotionError, PoolStatus};
pub use pricing::{PricingError, PricingPort};
pub use runner::{JobRunner, RunnerConfig};
pub use service::CampaignService;
pub use store::CampaignStore;
