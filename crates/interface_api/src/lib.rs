//! HTTP API for the billing pipeline
//!
//! A thin surface over the domain services: injected line creation, the
//! enumeration datasources consumed by form builders, and uuid redirect
//! endpoints. All failures are JSON envelopes with stable error classes.

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use core_kernel::Clock;
use domain_callback::{CallbackConfig, CallbackService, CallbackSink};
use domain_campaign::{CampaignService, JobRunner, PricingPort, RunnerConfig};
use domain_ledger::LedgerService;
use infra_store::MemoryStore;

use crate::config::ApiConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: MemoryStore,
    pub ledger: Arc<LedgerService>,
    pub callbacks: Arc<CallbackService>,
    pub campaigns: Arc<CampaignService>,
    pub runner: Arc<JobRunner>,
}

/// Wires the store and services together
///
/// This is the one place the object graph is assembled: the process
/// entrypoint calls it explicitly, no initialization happens as an import
/// side effect. The callback sink and pricing engine are deployment
/// collaborators supplied by the caller.
pub fn build_state(
    config: &ApiConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn CallbackSink>,
    pricing: Arc<dyn PricingPort>,
) -> AppState {
    let store = MemoryStore::new();

    let callbacks = Arc::new(CallbackService::new(
        Arc::new(store.clone()),
        sink,
        Arc::new(store.clone()),
        clock.clone(),
        CallbackConfig {
            max_retries: config.callback_max_retries,
            ..CallbackConfig::default()
        },
    ));
    let ledger = Arc::new(LedgerService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        callbacks.clone(),
        clock.clone(),
    ));
    let campaigns = Arc::new(CampaignService::new(Arc::new(store.clone()), clock.clone()));
    let runner = Arc::new(JobRunner::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        ledger.clone(),
        pricing,
        clock,
        RunnerConfig {
            max_running_jobs: config.max_running_jobs,
            pool_jobs_per_campaign: config.pool_jobs_per_campaign,
            ..RunnerConfig::default()
        },
    ));

    AppState {
        store,
        ledger,
        callbacks,
        campaigns,
        runner,
    }
}

/// Builds the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/regies/", get(handlers::catalogs::regies))
        .route(
            "/api/invoice-cancellation-reasons/",
            get(handlers::catalogs::invoice_cancellation_reasons),
        )
        .route(
            "/api/regie/:regie_identifier/payment-types/",
            get(handlers::catalogs::payment_types),
        )
        .route(
            "/api/regie/:regie_identifier/injected-lines/",
            post(handlers::injected_lines::add_injected_line),
        )
        .route(
            "/manage/invoicing/redirect/invoice/:invoice_uuid/",
            get(handlers::redirects::invoice_redirect),
        )
        .route(
            "/manage/invoicing/redirect/invoice/:invoice_uuid/pdf/",
            get(handlers::redirects::invoice_pdf_redirect),
        )
        .route(
            "/manage/invoicing/redirect/credit/:credit_uuid/",
            get(handlers::redirects::credit_redirect),
        )
        .route(
            "/manage/invoicing/redirect/credit/:credit_uuid/pdf/",
            get(handlers::redirects::credit_pdf_redirect),
        )
        .route(
            "/manage/invoicing/redirect/payment/:payment_uuid/",
            get(handlers::redirects::payment_redirect),
        )
        .route(
            "/manage/invoicing/redirect/payment/:payment_uuid/pdf/",
            get(handlers::redirects::payment_pdf_redirect),
        )
        .route(
            "/manage/invoicing/redirect/refund/:refund_uuid/",
            get(handlers::redirects::refund_redirect),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
