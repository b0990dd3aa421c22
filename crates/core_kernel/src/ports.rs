//! Ports infrastructure
//!
//! Domain crates define async port traits for everything supplied from
//! outside the core: persistence, callback delivery, pricing. Adapters (the
//! in-memory store, test mocks) implement them. This module provides the
//! error type all port implementations share.

use std::fmt;
use thiserror::Error;

/// Error type for port operations
///
/// A unified error type keeps error handling consistent across adapters:
/// domain services translate these at their boundary instead of leaking
/// adapter details.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested entity was not found
    #[error("Not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation conflicts with existing data
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored invariant would be violated
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// An internal adapter error occurred
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates a NotFound error
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        StoreError::Conflict(message.into())
    }

    /// Creates an Invariant error
    pub fn invariant(message: impl Into<String>) -> Self {
        StoreError::Invariant(message.into())
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found() {
        let error = StoreError::not_found("Invoice", 123);
        assert!(error.is_not_found());
        assert!(error.to_string().contains("Invoice"));
        assert!(error.to_string().contains("123"));
    }

    #[test]
    fn test_conflict_is_not_not_found() {
        assert!(!StoreError::conflict("busy").is_not_found());
    }
}
