//! Draft document generation
//!
//! Turns a pool's journal lines into per-payer draft invoices: one draft
//! invoice per payer, one draft line per successful journal line. Error
//! lines are left for manual triage and never abort the pool; payers with
//! nothing billable get no document.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use core_kernel::InjectedLineId;
use domain_ledger::{
    DraftInvoice, InvoiceDates, JournalLine, JournalLineData, LedgerStore, LineStatus,
    NewDraftInvoice, NewJournalLine, NewLine, Origin, PayerSnapshot,
};

use crate::campaign::{Campaign, InjectedLinesMode};
use crate::error::JobError;
use crate::pool::Pool;

/// Lines skipped during aggregation
///
/// Not-booked and cancelled events never bill; adjustment campaigns
/// additionally skip plain presences without a check type.
pub fn is_line_ignored(line: &JournalLine, campaign: &Campaign) -> bool {
    let booking_details = line.data.pricing_data.get("booking_details");
    let status = booking_details
        .and_then(|d| d.get("status"))
        .and_then(|s| s.as_str());
    if matches!(status, Some("not-booked") | Some("cancelled")) {
        return true;
    }
    if campaign.adjustment_campaign && status == Some("presence") {
        let check_type = booking_details
            .and_then(|d| d.get("check_type"))
            .and_then(|c| c.as_str());
        if check_type.is_none() {
            return true;
        }
    }
    false
}

/// Expands the regie's injected lines into journal lines of this pool
///
/// Injected lines already billed by a final pool are skipped, as are lines
/// this pool has already expanded (re-runs are idempotent).
pub async fn expand_injected_lines(
    store: &dyn LedgerStore,
    campaign: &Campaign,
    pool: &Pool,
    now: DateTime<Utc>,
) -> Result<usize, JobError> {
    let (start, end) = match campaign.injected_lines {
        InjectedLinesMode::No => return Ok(0),
        InjectedLinesMode::Period => (Some(campaign.date_start), campaign.date_end),
        InjectedLinesMode::All => (None, campaign.date_end),
    };

    let mut consumed: HashSet<InjectedLineId> = store
        .consumed_injected_line_ids(campaign.regie_id)
        .await?
        .into_iter()
        .collect();
    for line in store.journal_lines_for_pool(pool.id).await? {
        if let Some(id) = line.data.from_injected_line {
            consumed.insert(id);
        }
    }

    let mut expanded = 0;
    for injected in store.injected_lines(campaign.regie_id, start, end).await? {
        if consumed.contains(&injected.id) {
            continue;
        }
        store
            .insert_journal_line(
                NewJournalLine {
                    pool_id: Some(pool.id),
                    data: JournalLineData::from_injected(&injected),
                    error_status: None,
                },
                now,
            )
            .await?;
        expanded += 1;
    }
    Ok(expanded)
}

/// Groups the pool's successful journal lines by payer and creates draft
/// invoices; returns the documents created
pub async fn generate_draft_documents(
    store: &dyn LedgerStore,
    campaign: &Campaign,
    pool: &Pool,
    now: DateTime<Utc>,
) -> Result<Vec<DraftInvoice>, JobError> {
    let lines = store.journal_lines_for_pool(pool.id).await?;

    // regroup billable lines by payer, in first-seen order
    let mut payer_order: Vec<String> = Vec::new();
    let mut by_payer: HashMap<String, (PayerSnapshot, Vec<JournalLine>)> = HashMap::new();
    for line in lines {
        if line.data.status != LineStatus::Success {
            // lines in error are kept for triage, not billed
            continue;
        }
        if is_line_ignored(&line, campaign) {
            continue;
        }
        let key = line.data.payer.external_id.clone();
        if !by_payer.contains_key(&key) {
            payer_order.push(key.clone());
            by_payer.insert(key.clone(), (line.data.payer.clone(), Vec::new()));
        }
        if let Some((_, lines)) = by_payer.get_mut(&key) {
            lines.push(line);
        }
    }

    let mut invoices = Vec::new();
    for payer_key in payer_order {
        let Some((payer, journal_lines)) = by_payer.remove(&payer_key) else {
            continue;
        };
        if journal_lines.is_empty() {
            // don't create empty invoice
            continue;
        }

        let dates = InvoiceDates {
            publication: campaign.date_publication,
            payment_deadline_displayed: campaign.date_payment_deadline_displayed,
            payment_deadline: campaign.date_payment_deadline,
            due: campaign.date_due,
            debit: payer.direct_debit.then_some(campaign.date_debit),
            invoicing: None,
        };
        let invoice = store
            .insert_draft_invoice(
                NewDraftInvoice {
                    regie_id: campaign.regie_id,
                    pool_id: Some(pool.id),
                    label: campaign.invoice_label(),
                    payer,
                    dates,
                    origin: Origin::Campaign,
                    previous_invoice_id: None,
                    payment_callback_url: None,
                    cancel_callback_url: None,
                },
                now,
            )
            .await?;

        for mut journal_line in journal_lines {
            let draft_line = store
                .insert_draft_invoice_line(
                    invoice.id,
                    NewLine {
                        pool_id: Some(pool.id),
                        event_date: journal_line.data.event_date,
                        label: journal_line.data.label.clone(),
                        quantity: journal_line.data.quantity,
                        unit_amount: journal_line.data.amount,
                        description: journal_line.data.description.clone(),
                        event_slug: journal_line.data.slug.clone(),
                        event_label: journal_line.data.label.clone(),
                        agenda_slug: agenda_slug(&journal_line.data.slug),
                        activity_label: String::new(),
                        accounting_code: journal_line.data.accounting_code.clone(),
                        details: journal_line.data.pricing_data.clone(),
                        user: journal_line.data.user.clone(),
                    },
                    now,
                )
                .await?;
            journal_line.draft_invoice_line_id = Some(draft_line.id);
            store.update_journal_line(&journal_line).await?;
        }

        invoices.push(invoice);
    }

    Ok(invoices)
}

/// The agenda part of an `agenda@event` slug
fn agenda_slug(slug: &str) -> String {
    slug.split_once('@')
        .map(|(agenda, _)| agenda.to_string())
        .unwrap_or_default()
}
