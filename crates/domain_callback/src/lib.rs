//! Callback Domain - ordered notification delivery
//!
//! External systems are told about document state changes (payment received,
//! invoice cancelled, credit issued) through callbacks. The subsystem
//! guarantees:
//!
//! - per-target ordering: callbacks for one document are delivered in
//!   creation order, never out of order;
//! - bounded retries: a failing delivery is retried by the periodic sweep
//!   until the retry budget is exhausted, then parked as failed;
//! - isolation: delivery failures never propagate into the domain operation
//!   that triggered the notification.

pub mod callback;
pub mod ports;
pub mod service;

pub use callback::{
    Callback, CallbackFailure, CallbackStatus, TargetKind, TargetRef, RETRY_REASON_MAX_LEN,
};
pub use ports::{CallbackSink, CallbackStore, CallbackTargets, DeliveryTimeout, ResolveError};
pub use service::{CallbackConfig, CallbackService, NotifyOutcome};
