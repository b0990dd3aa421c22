//! Document redirect endpoints
//!
//! Resolve a document uuid to its canonical manager URL (or PDF rendering
//! path). External systems keep only the uuid; these endpoints decouple
//! them from the manager's URL layout. Unknown uuids are a 404.

use axum::{
    extract::{Path, State},
    response::Redirect,
};
use uuid::Uuid;

use domain_ledger::LedgerStore;
use domain_regie::RegieStore;

use crate::error::ApiError;
use crate::AppState;

pub async fn invoice_redirect(
    State(state): State<AppState>,
    Path(invoice_uuid): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let invoice = state.store.invoice_by_uuid(invoice_uuid).await?;
    let regie = state.store.regie(invoice.regie_id).await?;
    Ok(Redirect::temporary(&format!(
        "/manage/invoicing/regie/{}/invoices/{}/",
        regie.slug, invoice.uuid
    )))
}

pub async fn invoice_pdf_redirect(
    State(state): State<AppState>,
    Path(invoice_uuid): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let invoice = state.store.invoice_by_uuid(invoice_uuid).await?;
    let regie = state.store.regie(invoice.regie_id).await?;
    Ok(Redirect::temporary(&format!(
        "/manage/invoicing/regie/{}/invoices/{}/pdf/",
        regie.slug, invoice.uuid
    )))
}

pub async fn credit_redirect(
    State(state): State<AppState>,
    Path(credit_uuid): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let credit = state.store.credit_by_uuid(credit_uuid).await?;
    let regie = state.store.regie(credit.regie_id).await?;
    Ok(Redirect::temporary(&format!(
        "/manage/invoicing/regie/{}/credits/{}/",
        regie.slug, credit.uuid
    )))
}

pub async fn credit_pdf_redirect(
    State(state): State<AppState>,
    Path(credit_uuid): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let credit = state.store.credit_by_uuid(credit_uuid).await?;
    let regie = state.store.regie(credit.regie_id).await?;
    Ok(Redirect::temporary(&format!(
        "/manage/invoicing/regie/{}/credits/{}/pdf/",
        regie.slug, credit.uuid
    )))
}

pub async fn payment_redirect(
    State(state): State<AppState>,
    Path(payment_uuid): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let payment = state.store.payment_by_uuid(payment_uuid).await?;
    let regie = state.store.regie(payment.regie_id).await?;
    Ok(Redirect::temporary(&format!(
        "/manage/invoicing/regie/{}/payments/{}/",
        regie.slug, payment.uuid
    )))
}

pub async fn payment_pdf_redirect(
    State(state): State<AppState>,
    Path(payment_uuid): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let payment = state.store.payment_by_uuid(payment_uuid).await?;
    let regie = state.store.regie(payment.regie_id).await?;
    Ok(Redirect::temporary(&format!(
        "/manage/invoicing/regie/{}/payments/{}/pdf/",
        regie.slug, payment.uuid
    )))
}

pub async fn refund_redirect(
    State(state): State<AppState>,
    Path(refund_uuid): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let refund = state.store.refund_by_uuid(refund_uuid).await?;
    let regie = state.store.regie(refund.regie_id).await?;
    Ok(Redirect::temporary(&format!(
        "/manage/invoicing/regie/{}/refunds/{}/",
        regie.slug, refund.uuid
    )))
}
