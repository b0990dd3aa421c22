//! Callback entities
//!
//! A callback is a pending notification to an external billing-aware system
//! about a state change on one document. Delivery is ordered per target:
//! a callback never fires while an earlier one for the same target is still
//! pending.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use core_kernel::CallbackId;

/// The kinds of documents callbacks can attach to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Invoice,
    Credit,
    Payment,
    Refund,
}

/// A typed reference to the document a callback notifies about
///
/// Replaces runtime-polymorphic object references with a tagged pair; the
/// store resolves it back to the concrete row when a delivery URL is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub id: u64,
}

impl TargetRef {
    pub fn new(kind: TargetKind, id: u64) -> Self {
        Self { kind, id }
    }

    pub fn invoice(id: impl Into<u64>) -> Self {
        Self::new(TargetKind::Invoice, id.into())
    }

    pub fn credit(id: impl Into<u64>) -> Self {
        Self::new(TargetKind::Credit, id.into())
    }

    pub fn payment(id: impl Into<u64>) -> Self {
        Self::new(TargetKind::Payment, id.into())
    }

    pub fn refund(id: impl Into<u64>) -> Self {
        Self::new(TargetKind::Refund, id.into())
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TargetKind::Invoice => "invoice",
            TargetKind::Credit => "credit",
            TargetKind::Payment => "payment",
            TargetKind::Refund => "refund",
        };
        write!(f, "{kind}/{}", self.id)
    }
}

/// Callback lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackStatus {
    Registered,
    Running,
    ToRetry,
    Failed,
    Completed,
}

impl CallbackStatus {
    /// True for states that still expect a delivery attempt
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            CallbackStatus::Registered | CallbackStatus::Running | CallbackStatus::ToRetry
        )
    }

    /// True for terminal states
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallbackStatus::Completed | CallbackStatus::Failed)
    }
}

/// A persisted notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Callback {
    pub id: CallbackId,
    pub target: TargetRef,
    /// Which configured URL on the target to notify (payment, cancel, ...)
    pub notification_type: String,
    pub payload: serde_json::Value,
    pub status: CallbackStatus,
    pub retries_counter: u32,
    /// Truncated description of the last delivery failure
    pub retry_reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Maximum stored length of a retry reason
pub const RETRY_REASON_MAX_LEN: usize = 250;

/// Delivery failure raised by a callback sink
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct CallbackFailure(pub String);

impl CallbackFailure {
    /// Failure for an HTTP error status
    pub fn http(status: u16, notification_type: &str) -> Self {
        Self(format!("error (HTTP {status}) notifying {notification_type}"))
    }

    /// Failure for a transport-level error
    pub fn transport(description: &str, notification_type: &str) -> Self {
        Self(format!("error ({description}) notifying {notification_type}"))
    }

    /// The failure text truncated to the stored retry-reason length
    pub fn reason(&self) -> String {
        let mut reason = self.0.clone();
        if reason.len() > RETRY_REASON_MAX_LEN {
            let mut end = RETRY_REASON_MAX_LEN;
            while !reason.is_char_boundary(end) {
                end -= 1;
            }
            reason.truncate(end);
        }
        reason
    }
}
