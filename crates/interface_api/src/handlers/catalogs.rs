//! Enumeration endpoints
//!
//! Simple datasource listings, alphabetically ordered by label.

use axum::{
    extract::{Path, State},
    Json,
};

use domain_ledger::LedgerStore;
use domain_regie::RegieStore;

use crate::dto::{CatalogItem, CatalogResponse};
use crate::error::ApiError;
use crate::AppState;

/// Lists invoice cancellation reasons
pub async fn invoice_cancellation_reasons(
    State(state): State<AppState>,
) -> Result<Json<CatalogResponse>, ApiError> {
    let reasons = state.store.list_invoice_cancellation_reasons().await?;
    let data = reasons
        .into_iter()
        .filter(|r| !r.disabled)
        .map(|r| CatalogItem {
            id: r.slug.clone(),
            text: r.label,
            slug: r.slug,
        })
        .collect();
    Ok(Json(CatalogResponse::new(data)))
}

/// Lists regies
pub async fn regies(State(state): State<AppState>) -> Result<Json<CatalogResponse>, ApiError> {
    let regies = state.store.list_regies().await?;
    let data = regies
        .into_iter()
        .map(|r| CatalogItem {
            id: r.slug.clone(),
            text: r.label,
            slug: r.slug,
        })
        .collect();
    Ok(Json(CatalogResponse::new(data)))
}

/// Lists a regie's enabled payment types
pub async fn payment_types(
    State(state): State<AppState>,
    Path(regie_identifier): Path<String>,
) -> Result<Json<CatalogResponse>, ApiError> {
    let regie = state.store.regie_by_slug(&regie_identifier).await?;
    let types = state.store.payment_types(regie.id).await?;
    let data = types
        .into_iter()
        .filter(|t| !t.disabled)
        .map(|t| CatalogItem {
            id: t.slug.clone(),
            text: t.label,
            slug: t.slug,
        })
        .collect();
    Ok(Json(CatalogResponse::new(data)))
}
