//! Billing pipeline API server
//!
//! Starts the HTTP API and the background scheduler loop that drives the
//! job runner, the callback retry sweep and the retention cleanups.
//!
//! # Environment Variables
//!
//! * `BILLING_HOST` - Server host (default: 0.0.0.0)
//! * `BILLING_PORT` - Server port (default: 8080)
//! * `BILLING_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! * `BILLING_SCHEDULER_INTERVAL_SECS` - seconds between scheduler ticks
//! * `BILLING_MAX_RUNNING_JOBS` - cap on concurrently running jobs
//! * `BILLING_POOL_JOBS_PER_CAMPAIGN` - user batches per campaign run
//! * `BILLING_CALLBACK_MAX_RETRIES` - callback retry budget

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_callback::{CallbackFailure, CallbackSink, DeliveryTimeout};
use domain_campaign::{Campaign, Pool, PricingError, PricingPort};
use domain_ledger::{JournalLineData, UserSnapshot};
use interface_api::{build_state, config::ApiConfig, create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // load .env if present, useful for local development
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().unwrap_or_default();
    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting billing pipeline API server"
    );

    let state = build_state(
        &config,
        Arc::new(core_kernel::SystemClock),
        Arc::new(LoggingSink),
        Arc::new(ExternalPricing),
    );

    spawn_scheduler(state.clone(), config.scheduler_interval_secs);

    let app = create_router(state);
    let addr: SocketAddr = config.server_addr().parse()?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Starts the periodic scheduler
///
/// Each tick runs the ready jobs, sweeps pending callbacks and applies the
/// retention policies. The loop replaces external cron wiring for
/// single-process deployments; multi-process deployments can point several
/// instances at the same store safely, claims keep them exclusive.
fn spawn_scheduler(state: AppState, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            if let Err(err) = state.runner.run_pending_jobs().await {
                tracing::error!(%err, "job runner tick failed");
            }
            if let Err(err) = state.callbacks.retry_pending().await {
                tracing::error!(%err, "callback retry sweep failed");
            }
            if let Err(err) = state.runner.gc_jobs().await {
                tracing::error!(%err, "job garbage collection failed");
            }
            if let Err(err) = state.runner.clean_draft_pools().await {
                tracing::error!(%err, "draft pool cleanup failed");
            }
            if let Err(err) = state.callbacks.purge().await {
                tracing::error!(%err, "callback cleanup failed");
            }
        }
    });
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

/// Deployment-facing callback sink
///
/// Delivery transport is a deployment concern; this default sink records
/// deliveries in the log so the pipeline is observable without an external
/// receiver. Deployments wire their own `CallbackSink` in `build_state`.
struct LoggingSink;

#[async_trait]
impl CallbackSink for LoggingSink {
    async fn deliver(
        &self,
        url: &str,
        notification_type: &str,
        payload: &serde_json::Value,
        _timeout: DeliveryTimeout,
    ) -> Result<(), CallbackFailure> {
        tracing::info!(%url, notification_type, %payload, "callback delivered (logging sink)");
        Ok(())
    }
}

/// Placeholder pricing port for deployments without a pricing engine
///
/// Campaign runs find no subscribed users until a real engine is wired in.
struct ExternalPricing;

#[async_trait]
impl PricingPort for ExternalPricing {
    async fn users_for_period(
        &self,
        _campaign: &Campaign,
    ) -> Result<Vec<UserSnapshot>, PricingError> {
        Ok(Vec::new())
    }

    async fn lines_for_user(
        &self,
        _campaign: &Campaign,
        _pool: &Pool,
        _user: &UserSnapshot,
    ) -> Result<Vec<JournalLineData>, PricingError> {
        Ok(Vec::new())
    }
}
