//! Injected line creation

use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use core_kernel::Amount;
use domain_ledger::PayerSnapshot;
use domain_regie::RegieStore;

use crate::dto::{field_errors, CreatedResponse, InjectedLineRequest};
use crate::error::ApiError;
use crate::AppState;

/// Creates an injected line on a regie
pub async fn add_injected_line(
    State(state): State<AppState>,
    Path(regie_identifier): Path<String>,
    Json(request): Json<InjectedLineRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let regie = state.store.regie_by_slug(&regie_identifier).await?;

    if let Err(errors) = request.validate() {
        return Err(ApiError::Validation(field_errors(&errors)));
    }
    let amount = Amount::new(request.amount).map_err(|err| {
        let mut errors = std::collections::BTreeMap::new();
        errors.insert("amount".to_string(), vec![err.to_string()]);
        ApiError::Validation(errors)
    })?;

    let payer = PayerSnapshot {
        external_id: request.payer_external_id.clone(),
        first_name: request.payer_first_name.clone(),
        last_name: request.payer_last_name.clone(),
        address: request.payer_address.clone(),
        email: String::new(),
        phone: String::new(),
        direct_debit: request.payer_direct_debit,
    };
    let line = state
        .ledger
        .create_injected_line(
            regie.id,
            request.event_date,
            &request.slug,
            &request.label,
            amount,
            &request.user_external_id,
            payer,
        )
        .await?;

    Ok(Json(CreatedResponse {
        err: 0,
        id: line.id.value(),
    }))
}
