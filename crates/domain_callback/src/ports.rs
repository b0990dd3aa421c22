//! Callback ports
//!
//! Persistence, delivery and URL resolution are supplied from outside the
//! domain. The store's `claim` is the concurrency primitive: an atomic
//! conditional status update that at most one caller wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use core_kernel::{CallbackId, StoreError};

use crate::callback::{Callback, CallbackFailure, TargetRef};

/// Persistence port for callbacks
#[async_trait]
pub trait CallbackStore: Send + Sync {
    async fn insert_callback(
        &self,
        target: TargetRef,
        notification_type: &str,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Callback, StoreError>;

    async fn callback(&self, id: CallbackId) -> Result<Callback, StoreError>;

    /// Atomically moves a pending callback (`Registered` or `ToRetry`) to
    /// `Running`. Returns the claimed row, or `None` when another caller won
    /// or the callback is not in a claimable state.
    async fn claim_callback(
        &self,
        id: CallbackId,
        now: DateTime<Utc>,
    ) -> Result<Option<Callback>, StoreError>;

    /// Writes back status, retry counter and reason
    async fn update_callback(
        &self,
        callback: &Callback,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// True when an earlier-created callback for the same target is still
    /// pending (registered, running or to retry)
    async fn has_previous_pending(
        &self,
        target: TargetRef,
        created_before: DateTime<Utc>,
        id: CallbackId,
    ) -> Result<bool, StoreError>;

    /// All pending callbacks (registered or to retry) ordered by creation
    async fn pending_callbacks(&self) -> Result<Vec<Callback>, StoreError>;

    /// Deletes terminal callbacks whose `updated_at` is before the cutoff;
    /// returns how many were removed
    async fn purge_terminal_callbacks(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Connect/read timeout tier for one delivery attempt
///
/// First attempts use a short connect timeout; retries allow a longer read
/// window since they run from the background sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryTimeout {
    pub connect: Duration,
    pub read: Option<Duration>,
}

impl DeliveryTimeout {
    pub fn first_attempt() -> Self {
        Self {
            connect: Duration::from_secs(15),
            read: None,
        }
    }

    pub fn retry() -> Self {
        Self {
            connect: Duration::from_secs(15),
            read: Some(Duration::from_secs(60)),
        }
    }
}

/// Delivery port: posts the payload to the resolved URL
#[async_trait]
pub trait CallbackSink: Send + Sync {
    async fn deliver(
        &self,
        url: &str,
        notification_type: &str,
        payload: &serde_json::Value,
        timeout: DeliveryTimeout,
    ) -> Result<(), CallbackFailure>;
}

/// Error resolving a callback target
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The target row no longer exists; the callback stays pending
    #[error("unknown callback target {0}")]
    UnknownTarget(TargetRef),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolution port: maps a target and notification type to its configured URL
///
/// `Ok(None)` means the target exists but has no URL configured for this
/// notification type: the callback completes without a delivery.
#[async_trait]
pub trait CallbackTargets: Send + Sync {
    async fn resolve_url(
        &self,
        target: TargetRef,
        notification_type: &str,
    ) -> Result<Option<String>, ResolveError>;
}
