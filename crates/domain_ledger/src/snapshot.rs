//! Identity snapshots
//!
//! Payer and user identity is supplied as opaque strings at line-creation
//! time and denormalized onto every document row. The ledger never
//! re-resolves them: the snapshot is the audit-stable record even if the
//! person's data changes later.

use serde::{Deserialize, Serialize};

/// The party financially responsible for a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerSnapshot {
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub direct_debit: bool,
}

impl PayerSnapshot {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(
        external_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Default::default()
        }
    }

    /// Display name built from the snapshotted name parts
    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// The part of the external id after its namespace prefix
    pub fn external_raw_id(&self) -> &str {
        self.external_id
            .split_once(':')
            .map(|(_, raw)| raw)
            .unwrap_or(&self.external_id)
    }
}

/// The person who benefited from the billed event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
}

impl UserSnapshot {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(
        external_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_trims_missing_parts() {
        let payer = PayerSnapshot::with_name("payer:1", "Jean", "");
        assert_eq!(payer.name(), "Jean");
    }

    #[test]
    fn test_external_raw_id() {
        let payer = PayerSnapshot::new("payer:42");
        assert_eq!(payer.external_raw_id(), "42");
        let plain = PayerSnapshot::new("42");
        assert_eq!(plain.external_raw_id(), "42");
    }
}
