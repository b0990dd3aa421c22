//! API error handling
//!
//! Failures are returned as structured JSON envelopes with stable
//! machine-readable classes: `{"err": 1, "err_class": ..., "err_desc": ...}`
//! plus a field-error map for validation failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use domain_ledger::LedgerError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed")]
    Validation(BTreeMap<String, Vec<String>>),

    #[error("{desc}")]
    BadRequest { class: &'static str, desc: String },

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response envelope
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub err: u8,
    pub err_class: String,
    pub err_desc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, err_class, err_desc, errors) = match self {
            ApiError::NotFound(desc) => {
                (StatusCode::NOT_FOUND, "not-found".to_string(), desc, None)
            }
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "invalid".to_string(),
                "invalid payload".to_string(),
                Some(errors),
            ),
            ApiError::BadRequest { class, desc } => {
                (StatusCode::BAD_REQUEST, class.to_string(), desc, None)
            }
            ApiError::Internal(desc) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal-error".to_string(),
                desc,
                None,
            ),
        };

        let body = ErrorEnvelope {
            err: 1,
            err_class,
            err_desc,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

impl From<core_kernel::StoreError> for ApiError {
    fn from(err: core_kernel::StoreError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(field_errors) => {
                let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for field_error in field_errors {
                    errors
                        .entry(field_error.field.to_string())
                        .or_default()
                        .push(field_error.message);
                }
                ApiError::Validation(errors)
            }
            LedgerError::Store(err) => err.into(),
            LedgerError::InvalidOperation(desc) => ApiError::BadRequest {
                class: "invalid-operation",
                desc,
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}
