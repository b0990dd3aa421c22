//! Callback port implementations
//!
//! The store resolves delivery URLs from the target document rows, the way
//! the domain resolves `<type>_callback_url` fields.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{CallbackId, StoreError};
use domain_callback::{
    Callback, CallbackStatus, CallbackStore, CallbackTargets, ResolveError, TargetKind, TargetRef,
};

use crate::memory::MemoryStore;

#[async_trait]
impl CallbackStore for MemoryStore {
    async fn insert_callback(
        &self,
        target: TargetRef,
        notification_type: &str,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Callback, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("callbacks");
        let callback = Callback {
            id: CallbackId::new(id),
            target,
            notification_type: notification_type.to_string(),
            payload,
            status: CallbackStatus::Registered,
            retries_counter: 0,
            retry_reason: String::new(),
            created_at: now,
            updated_at: now,
        };
        tables.callbacks.insert(id, callback.clone());
        Ok(callback)
    }

    async fn callback(&self, id: CallbackId) -> Result<Callback, StoreError> {
        self.lock()
            .callbacks
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("Callback", id))
    }

    async fn claim_callback(
        &self,
        id: CallbackId,
        now: DateTime<Utc>,
    ) -> Result<Option<Callback>, StoreError> {
        let mut tables = self.lock();
        let callback = tables
            .callbacks
            .get_mut(&id.value())
            .ok_or_else(|| StoreError::not_found("Callback", id))?;
        if !matches!(
            callback.status,
            CallbackStatus::Registered | CallbackStatus::ToRetry
        ) {
            return Ok(None);
        }
        callback.status = CallbackStatus::Running;
        callback.updated_at = now;
        Ok(Some(callback.clone()))
    }

    async fn update_callback(
        &self,
        callback: &Callback,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let id = callback.id.value();
        if !tables.callbacks.contains_key(&id) {
            return Err(StoreError::not_found("Callback", callback.id));
        }
        let mut updated = callback.clone();
        updated.updated_at = now;
        tables.callbacks.insert(id, updated);
        Ok(())
    }

    async fn has_previous_pending(
        &self,
        target: TargetRef,
        created_before: DateTime<Utc>,
        id: CallbackId,
    ) -> Result<bool, StoreError> {
        let tables = self.lock();
        Ok(tables.callbacks.values().any(|c| {
            c.target == target
                && c.id != id
                && c.status.is_pending()
                && (c.created_at < created_before
                    || (c.created_at == created_before && c.id < id))
        }))
    }

    async fn pending_callbacks(&self) -> Result<Vec<Callback>, StoreError> {
        let mut pending: Vec<Callback> = self
            .lock()
            .callbacks
            .values()
            .filter(|c| {
                matches!(
                    c.status,
                    CallbackStatus::Registered | CallbackStatus::ToRetry
                )
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(pending)
    }

    async fn purge_terminal_callbacks(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut tables = self.lock();
        let before = tables.callbacks.len();
        tables
            .callbacks
            .retain(|_, c| !(c.status.is_terminal() && c.updated_at < cutoff));
        Ok(before - tables.callbacks.len())
    }
}

#[async_trait]
impl CallbackTargets for MemoryStore {
    async fn resolve_url(
        &self,
        target: TargetRef,
        notification_type: &str,
    ) -> Result<Option<String>, ResolveError> {
        let tables = self.lock();
        match target.kind {
            TargetKind::Invoice => {
                let invoice = tables
                    .invoices
                    .get(&target.id)
                    .ok_or(ResolveError::UnknownTarget(target))?;
                let url = match notification_type {
                    "payment" => invoice.payment_callback_url.clone(),
                    "cancel" => invoice.cancel_callback_url.clone(),
                    _ => None,
                };
                Ok(url.filter(|u| !u.is_empty()))
            }
            TargetKind::Credit => {
                tables
                    .credits
                    .get(&target.id)
                    .ok_or(ResolveError::UnknownTarget(target))?;
                Ok(None)
            }
            TargetKind::Payment => {
                tables
                    .payments
                    .get(&target.id)
                    .ok_or(ResolveError::UnknownTarget(target))?;
                Ok(None)
            }
            TargetKind::Refund => {
                tables
                    .refunds
                    .get(&target.id)
                    .ok_or(ResolveError::UnknownTarget(target))?;
                Ok(None)
            }
        }
    }
}
