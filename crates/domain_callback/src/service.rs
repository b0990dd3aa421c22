//! Callback delivery service
//!
//! `notify` records a callback and attempts delivery immediately; the
//! periodic retry sweep advances anything left pending. Per-target ordering
//! is guaranteed by refusing to deliver a callback while an earlier one for
//! the same target is unfinished; the sweep processes callbacks oldest
//! first, so blocked chains drain in creation order.

use chrono::Duration;
use std::sync::Arc;
use tracing::{error, info, warn};

use core_kernel::{CallbackId, Clock, StoreError};

use crate::callback::{Callback, CallbackStatus, TargetRef};
use crate::ports::{CallbackSink, CallbackStore, CallbackTargets, DeliveryTimeout, ResolveError};

/// Callback subsystem configuration
#[derive(Debug, Clone)]
pub struct CallbackConfig {
    /// Delivery attempts beyond the first before a callback fails for good
    pub max_retries: u32,
    /// Timeout tier applied to a callback's first delivery attempt
    pub first_timeout: DeliveryTimeout,
    /// Timeout tier applied to retry attempts from the sweep
    pub retry_timeout: DeliveryTimeout,
    /// Days a terminal callback is kept before purging
    pub retention_days: i64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            max_retries: 42,
            first_timeout: DeliveryTimeout::first_attempt(),
            retry_timeout: DeliveryTimeout::retry(),
            retention_days: 50,
        }
    }
}

/// Outcome of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Delivered (or nothing configured to deliver to)
    Completed,
    /// An earlier callback for the same target is still pending
    Blocked,
    /// Another runner claimed this callback, or it is already terminal
    NotClaimed,
    /// The target row is gone; the callback stays pending untouched
    TargetMissing,
    /// Delivery failed, another attempt is scheduled
    Retrying,
    /// Delivery failed past the retry budget
    Failed,
}

/// Ordered, bounded-retry notification delivery
pub struct CallbackService {
    store: Arc<dyn CallbackStore>,
    sink: Arc<dyn CallbackSink>,
    targets: Arc<dyn CallbackTargets>,
    clock: Arc<dyn Clock>,
    config: CallbackConfig,
}

impl CallbackService {
    pub fn new(
        store: Arc<dyn CallbackStore>,
        sink: Arc<dyn CallbackSink>,
        targets: Arc<dyn CallbackTargets>,
        clock: Arc<dyn Clock>,
        config: CallbackConfig,
    ) -> Self {
        Self {
            store,
            sink,
            targets,
            clock,
            config,
        }
    }

    /// Records a callback for a target and attempts delivery immediately
    ///
    /// Fire-and-forget from the caller's point of view: delivery failures are
    /// absorbed into the callback's retry state and never surface to the
    /// domain operation that triggered the notification.
    pub async fn notify(
        &self,
        target: TargetRef,
        notification_type: &str,
        payload: serde_json::Value,
    ) -> Result<Callback, StoreError> {
        let callback = self
            .store
            .insert_callback(target, notification_type, payload, self.clock.now())
            .await?;

        if let Err(err) = self.do_notify(callback.id).await {
            warn!(callback = %callback.id, %err, "callback delivery attempt errored");
        }

        self.store.callback(callback.id).await
    }

    /// Attempts delivery of one callback
    ///
    /// No-op while an earlier callback for the same target is pending, and
    /// when another runner holds the claim.
    pub async fn do_notify(&self, id: CallbackId) -> Result<NotifyOutcome, StoreError> {
        let callback = self.store.callback(id).await?;

        if self
            .store
            .has_previous_pending(callback.target, callback.created_at, callback.id)
            .await?
        {
            return Ok(NotifyOutcome::Blocked);
        }

        let mut callback = match self.store.claim_callback(id, self.clock.now()).await? {
            Some(callback) => callback,
            None => return Ok(NotifyOutcome::NotClaimed),
        };

        let url = match self
            .targets
            .resolve_url(callback.target, &callback.notification_type)
            .await
        {
            Ok(Some(url)) => url,
            Ok(None) => {
                // nothing configured for this notification type
                callback.status = CallbackStatus::Completed;
                self.store
                    .update_callback(&callback, self.clock.now())
                    .await?;
                return Ok(NotifyOutcome::Completed);
            }
            Err(ResolveError::UnknownTarget(target)) => {
                warn!(callback = %callback.id, %target, "callback target is gone, leaving pending");
                callback.status = if callback.retries_counter == 0 {
                    CallbackStatus::Registered
                } else {
                    CallbackStatus::ToRetry
                };
                self.store
                    .update_callback(&callback, self.clock.now())
                    .await?;
                return Ok(NotifyOutcome::TargetMissing);
            }
            Err(ResolveError::Store(err)) => return Err(err),
        };

        let timeout = if callback.retries_counter == 0 {
            self.config.first_timeout
        } else {
            self.config.retry_timeout
        };

        match self
            .sink
            .deliver(&url, &callback.notification_type, &callback.payload, timeout)
            .await
        {
            Ok(()) => {
                callback.status = CallbackStatus::Completed;
                self.store
                    .update_callback(&callback, self.clock.now())
                    .await?;
                info!(callback = %callback.id, target = %callback.target, "callback delivered");
                Ok(NotifyOutcome::Completed)
            }
            Err(failure) => {
                callback.retries_counter += 1;
                callback.retry_reason = failure.reason();
                let outcome = if callback.retries_counter > self.config.max_retries {
                    callback.status = CallbackStatus::Failed;
                    NotifyOutcome::Failed
                } else {
                    callback.status = CallbackStatus::ToRetry;
                    NotifyOutcome::Retrying
                };
                self.store
                    .update_callback(&callback, self.clock.now())
                    .await?;
                if callback.retries_counter > self.config.max_retries / 2 {
                    error!(
                        callback = %callback.id,
                        target = %callback.target,
                        retries = callback.retries_counter,
                        reason = %callback.retry_reason,
                        "callback delivery failed"
                    );
                } else {
                    warn!(
                        callback = %callback.id,
                        target = %callback.target,
                        retries = callback.retries_counter,
                        reason = %callback.retry_reason,
                        "callback delivery failed"
                    );
                }
                Ok(outcome)
            }
        }
    }

    /// Attempts every pending callback, oldest first
    ///
    /// This is what unblocks chains held back by the per-target ordering
    /// guarantee: once the head of a chain completes or fails, the next sweep
    /// delivers its successor.
    pub async fn retry_pending(&self) -> Result<usize, StoreError> {
        let pending = self.store.pending_callbacks().await?;
        let count = pending.len();
        for callback in pending {
            if let Err(err) = self.do_notify(callback.id).await {
                warn!(callback = %callback.id, %err, "callback retry errored");
            }
        }
        Ok(count)
    }

    /// Removes terminal callbacks past the retention window
    pub async fn purge(&self) -> Result<usize, StoreError> {
        let cutoff = self.clock.now() - Duration::days(self.config.retention_days);
        let purged = self.store.purge_terminal_callbacks(cutoff).await?;
        if purged > 0 {
            info!(purged, "purged terminal callbacks");
        }
        Ok(purged)
    }
}
