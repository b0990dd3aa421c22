//! Payer resolution
//!
//! The regie configuration decides who is financially responsible for a
//! line. Resolution renders the regie's payer template against the user
//! external id; the result is snapshotted onto every document and never
//! re-resolved.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::regie::Regie;

/// Reason codes carried by payer resolution failures
///
/// These are stable machine-readable strings recorded in journal line
/// pricing data for later triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayerErrorReason {
    EmptyTemplate,
    EmptyResult,
    SyntaxError,
    VariableError,
}

impl PayerErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayerErrorReason::EmptyTemplate => "empty-template",
            PayerErrorReason::EmptyResult => "empty-result",
            PayerErrorReason::SyntaxError => "syntax-error",
            PayerErrorReason::VariableError => "variable-error",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("payer error: {}", reason.as_str())]
pub struct PayerError {
    pub reason: PayerErrorReason,
}

impl PayerError {
    pub fn new(reason: PayerErrorReason) -> Self {
        Self { reason }
    }
}

/// Resolves the payer external id for a user external id
///
/// The template may reference `{user_external_id}` or
/// `{user_external_raw_id}` (the part after the first colon). The configured
/// prefix is prepended to the rendered value.
pub fn payer_external_id(regie: &Regie, user_external_id: &str) -> Result<String, PayerError> {
    let template = regie.payer_external_id_template.as_str();
    if template.is_empty() {
        return Err(PayerError::new(PayerErrorReason::EmptyTemplate));
    }

    let raw_id = user_external_id
        .split_once(':')
        .map(|(_, raw)| raw)
        .unwrap_or(user_external_id);

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '{' {
            if c == '}' {
                return Err(PayerError::new(PayerErrorReason::SyntaxError));
            }
            out.push(c);
            continue;
        }
        let mut field = String::new();
        let mut closed = false;
        for fc in chars.by_ref() {
            if fc == '}' {
                closed = true;
                break;
            }
            field.push(fc);
        }
        if !closed {
            return Err(PayerError::new(PayerErrorReason::SyntaxError));
        }
        match field.as_str() {
            "user_external_id" => out.push_str(user_external_id),
            "user_external_raw_id" => out.push_str(raw_id),
            _ => return Err(PayerError::new(PayerErrorReason::VariableError)),
        }
    }

    if out.is_empty() {
        return Err(PayerError::new(PayerErrorReason::EmptyResult));
    }
    Ok(format!("{}{}", regie.payer_external_id_prefix, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_kernel::RegieId;

    fn regie(template: &str, prefix: &str) -> Regie {
        let now = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let mut regie = Regie::new(RegieId::new(1), "Foo", "foo", now);
        regie.payer_external_id_template = template.to_string();
        regie.payer_external_id_prefix = prefix.to_string();
        regie
    }

    #[test]
    fn test_resolution_with_prefix() {
        let regie = regie("{user_external_id}", "payer:");
        assert_eq!(
            payer_external_id(&regie, "user:42").unwrap(),
            "payer:user:42"
        );
    }

    #[test]
    fn test_raw_id_strips_namespace() {
        let regie = regie("{user_external_raw_id}", "");
        assert_eq!(payer_external_id(&regie, "user:42").unwrap(), "42");
    }

    #[test]
    fn test_empty_template() {
        let regie = regie("", "");
        assert_eq!(
            payer_external_id(&regie, "user:42").unwrap_err().reason,
            PayerErrorReason::EmptyTemplate
        );
    }

    #[test]
    fn test_unknown_variable() {
        let regie = regie("{nameid}", "");
        assert_eq!(
            payer_external_id(&regie, "user:42").unwrap_err().reason,
            PayerErrorReason::VariableError
        );
    }

    #[test]
    fn test_syntax_error() {
        let regie = regie("{user_external_id", "");
        assert_eq!(
            payer_external_id(&regie, "user:42").unwrap_err().reason,
            PayerErrorReason::SyntaxError
        );
    }
}
