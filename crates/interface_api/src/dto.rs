//! Request and response DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Injected line creation payload
///
/// String fields default to empty when absent so that missing and blank
/// values produce the same field error.
#[derive(Debug, Deserialize, Validate)]
pub struct InjectedLineRequest {
    pub event_date: NaiveDate,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub slug: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub label: String,
    pub amount: Decimal,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub user_external_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub payer_external_id: String,
    #[serde(default)]
    pub payer_first_name: String,
    #[serde(default)]
    pub payer_last_name: String,
    #[serde(default)]
    pub payer_address: String,
    #[serde(default)]
    pub payer_direct_debit: bool,
}

/// Collects validator output into the field-error envelope shape
pub fn field_errors(errors: &validator::ValidationErrors) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (field, failures) in errors.field_errors() {
        let messages = failures
            .iter()
            .map(|f| {
                f.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid value.".to_string())
            })
            .collect();
        out.insert(field.to_string(), messages);
    }
    out
}

/// Creation success envelope
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub err: u8,
    pub id: u64,
}

/// Enumeration entry for datasource endpoints
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub text: String,
    pub slug: String,
}

/// Enumeration envelope
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub err: u8,
    pub data: Vec<CatalogItem>,
}

impl CatalogResponse {
    pub fn new(data: Vec<CatalogItem>) -> Self {
        Self { err: 0, data }
    }
}
