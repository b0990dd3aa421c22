//! Ledger port implementation
//!
//! `apply_line_payments` and `reverse_line_payments` are the two mutations
//! that must be atomic: they run entirely under the table lock, enforcing
//! the settlement invariant on every touched line and recomputing the
//! affected invoices before the lock is released.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

use core_kernel::{
    Amount, CollectionDocketId, CreditId, DraftInvoiceId, InjectedLineId, InvoiceId,
    PaymentDocketId, PaymentId, PoolId, RegieId, StoreError,
};
use domain_ledger::{
    CancellationReason, CollectionDocket, Credit, CreditAssignment,
    CreditCancellationReason, CreditLine, DraftInvoice, DraftInvoiceLine, InjectedLine, Invoice,
    InvoiceCancellationReason, InvoiceLine, InvoiceLinePayment, JournalLine, LedgerStore,
    LineAllocation, NewDraftInvoice, NewJournalLine, NewLine, Origin, PayerDocumentFilter, Payment,
    PaymentCancellationReason, PaymentDocket, Refund,
};

use crate::memory::{MemoryStore, Tables};

/// True when the document's pool (if any) belongs to a finalized campaign
fn campaign_finalized(tables: &Tables, pool_id: Option<PoolId>) -> bool {
    let Some(pool_id) = pool_id else {
        return true;
    };
    let Some(pool) = tables.pools.get(&pool_id.value()) else {
        return false;
    };
    tables
        .campaigns
        .get(&pool.campaign_id.value())
        .map(|c| c.finalized)
        .unwrap_or(false)
}

/// Recomputes an invoice's paid/remaining amounts from its lines
fn recompute_invoice(tables: &mut Tables, invoice_id: InvoiceId) -> Result<Invoice, StoreError> {
    let mut paid = Amount::zero();
    let mut remaining = Amount::zero();
    let mut total = Amount::zero();
    for line in tables
        .invoice_lines
        .values()
        .filter(|l| l.invoice_id == invoice_id)
    {
        paid = paid
            .checked_add(line.paid_amount)
            .map_err(|e| StoreError::invariant(e.to_string()))?;
        remaining = remaining
            .checked_add(line.remaining_amount)
            .map_err(|e| StoreError::invariant(e.to_string()))?;
        total = total
            .checked_add(line.total_amount)
            .map_err(|e| StoreError::invariant(e.to_string()))?;
    }
    let invoice = tables
        .invoices
        .get_mut(&invoice_id.value())
        .ok_or_else(|| StoreError::not_found("Invoice", invoice_id))?;
    invoice.total_amount = total;
    invoice.paid_amount = paid;
    invoice.remaining_amount = remaining;
    Ok(invoice.clone())
}

/// Recomputes a credit's total and remaining amounts
fn recompute_credit(tables: &mut Tables, credit_id: CreditId) -> Result<Credit, StoreError> {
    let mut total = Amount::zero();
    for line in tables
        .credit_lines
        .values()
        .filter(|l| l.credit_id == credit_id)
    {
        total = total
            .checked_add(line.total_amount)
            .map_err(|e| StoreError::invariant(e.to_string()))?;
    }
    let credit = tables
        .credits
        .get_mut(&credit_id.value())
        .ok_or_else(|| StoreError::not_found("Credit", credit_id))?;
    credit.total_amount = total;
    credit.remaining_amount = total
        .checked_sub(credit.assigned_amount)
        .map_err(|e| StoreError::invariant(e.to_string()))?;
    Ok(credit.clone())
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_injected_line(
        &self,
        regie_id: RegieId,
        event_date: NaiveDate,
        slug: String,
        label: String,
        amount: Amount,
        user_external_id: String,
        payer: domain_ledger::PayerSnapshot,
        now: DateTime<Utc>,
    ) -> Result<InjectedLine, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("injected_lines");
        let line = InjectedLine {
            id: InjectedLineId::new(id),
            regie_id,
            event_date,
            slug,
            label,
            amount,
            user_external_id,
            payer,
            created_at: now,
        };
        tables.injected_lines.insert(id, line.clone());
        Ok(line)
    }

    async fn injected_lines(
        &self,
        regie_id: RegieId,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> Result<Vec<InjectedLine>, StoreError> {
        Ok(self
            .lock()
            .injected_lines
            .values()
            .filter(|l| l.regie_id == regie_id)
            .filter(|l| l.event_date < end)
            .filter(|l| start.map(|s| l.event_date >= s).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn consumed_injected_line_ids(
        &self,
        regie_id: RegieId,
    ) -> Result<Vec<InjectedLineId>, StoreError> {
        let tables = self.lock();
        let mut consumed = BTreeSet::new();
        for line in tables.journal_lines.values() {
            let Some(injected_id) = line.data.from_injected_line else {
                continue;
            };
            let final_pool = line
                .pool_id
                .and_then(|p| tables.pools.get(&p.value()))
                .map(|p| !p.draft)
                .unwrap_or(false);
            if !final_pool {
                continue;
            }
            let belongs = tables
                .injected_lines
                .get(&injected_id.value())
                .map(|i| i.regie_id == regie_id)
                .unwrap_or(false);
            if belongs {
                consumed.insert(injected_id);
            }
        }
        Ok(consumed.into_iter().collect())
    }

    async fn insert_journal_line(
        &self,
        line: NewJournalLine,
        now: DateTime<Utc>,
    ) -> Result<JournalLine, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("journal_lines");
        let journal_line = JournalLine {
            id: core_kernel::JournalLineId::new(id),
            pool_id: line.pool_id,
            data: line.data,
            error_status: line.error_status,
            draft_invoice_line_id: None,
            invoice_line_id: None,
            credit_line_id: None,
            created_at: now,
        };
        tables.journal_lines.insert(id, journal_line.clone());
        Ok(journal_line)
    }

    async fn journal_line(
        &self,
        id: core_kernel::JournalLineId,
    ) -> Result<JournalLine, StoreError> {
        self.lock()
            .journal_lines
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("JournalLine", id))
    }

    async fn journal_lines_for_pool(&self, pool_id: PoolId) -> Result<Vec<JournalLine>, StoreError> {
        Ok(self
            .lock()
            .journal_lines
            .values()
            .filter(|l| l.pool_id == Some(pool_id))
            .cloned()
            .collect())
    }

    async fn update_journal_line(&self, line: &JournalLine) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let id = line.id.value();
        if !tables.journal_lines.contains_key(&id) {
            return Err(StoreError::not_found("JournalLine", line.id));
        }
        tables.journal_lines.insert(id, line.clone());
        Ok(())
    }

    async fn insert_draft_invoice(
        &self,
        invoice: NewDraftInvoice,
        now: DateTime<Utc>,
    ) -> Result<DraftInvoice, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("draft_invoices");
        let draft = DraftInvoice {
            id: DraftInvoiceId::new(id),
            regie_id: invoice.regie_id,
            pool_id: invoice.pool_id,
            label: invoice.label,
            total_amount: Amount::zero(),
            payer: invoice.payer,
            dates: invoice.dates,
            origin: invoice.origin,
            previous_invoice_id: invoice.previous_invoice_id,
            payment_callback_url: invoice.payment_callback_url,
            cancel_callback_url: invoice.cancel_callback_url,
            created_at: now,
        };
        tables.draft_invoices.insert(id, draft.clone());
        Ok(draft)
    }

    async fn insert_draft_invoice_line(
        &self,
        invoice_id: DraftInvoiceId,
        line: NewLine,
        now: DateTime<Utc>,
    ) -> Result<DraftInvoiceLine, StoreError> {
        let mut tables = self.lock();
        if !tables.draft_invoices.contains_key(&invoice_id.value()) {
            return Err(StoreError::not_found("DraftInvoice", invoice_id));
        }
        let id = tables.next_id("draft_invoice_lines");
        let total_amount = line
            .unit_amount
            .checked_mul(line.quantity)
            .map_err(|e| StoreError::invariant(e.to_string()))?;
        let draft_line = DraftInvoiceLine {
            id: core_kernel::DraftInvoiceLineId::new(id),
            invoice_id,
            pool_id: line.pool_id,
            event_date: line.event_date,
            label: line.label,
            quantity: line.quantity,
            unit_amount: line.unit_amount,
            total_amount,
            description: line.description,
            event_slug: line.event_slug,
            event_label: line.event_label,
            agenda_slug: line.agenda_slug,
            activity_label: line.activity_label,
            accounting_code: line.accounting_code,
            details: line.details,
            user: line.user,
            created_at: now,
        };
        tables.draft_invoice_lines.insert(id, draft_line.clone());

        // keep the draft total in step with its lines
        let total: Amount = tables
            .draft_invoice_lines
            .values()
            .filter(|l| l.invoice_id == invoice_id)
            .map(|l| l.total_amount)
            .sum();
        if let Some(draft) = tables.draft_invoices.get_mut(&invoice_id.value()) {
            draft.total_amount = total;
        }

        Ok(draft_line)
    }

    async fn draft_invoice(&self, id: DraftInvoiceId) -> Result<DraftInvoice, StoreError> {
        self.lock()
            .draft_invoices
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("DraftInvoice", id))
    }

    async fn draft_invoices_for_pool(
        &self,
        pool_id: PoolId,
    ) -> Result<Vec<DraftInvoice>, StoreError> {
        Ok(self
            .lock()
            .draft_invoices
            .values()
            .filter(|i| i.pool_id == Some(pool_id))
            .cloned()
            .collect())
    }

    async fn draft_invoice_lines(
        &self,
        invoice_id: DraftInvoiceId,
    ) -> Result<Vec<DraftInvoiceLine>, StoreError> {
        Ok(self
            .lock()
            .draft_invoice_lines
            .values()
            .filter(|l| l.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn delete_draft_documents_for_pool(&self, pool_id: PoolId) -> Result<(), StoreError> {
        let mut tables = self.lock();
        tables
            .journal_lines
            .retain(|_, l| l.pool_id != Some(pool_id));
        let draft_ids: Vec<u64> = tables
            .draft_invoices
            .values()
            .filter(|i| i.pool_id == Some(pool_id))
            .map(|i| i.id.value())
            .collect();
        tables
            .draft_invoice_lines
            .retain(|_, l| !draft_ids.contains(&l.invoice_id.value()));
        tables
            .draft_invoices
            .retain(|_, i| i.pool_id != Some(pool_id));
        Ok(())
    }

    async fn insert_invoice(
        &self,
        regie_id: RegieId,
        pool_id: Option<PoolId>,
        number: u64,
        formatted_number: String,
        label: String,
        payer: domain_ledger::PayerSnapshot,
        dates: domain_ledger::InvoiceDates,
        origin: Origin,
        previous_invoice_id: Option<InvoiceId>,
        payment_callback_url: Option<String>,
        cancel_callback_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Invoice, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("invoices");
        let invoice = Invoice {
            id: InvoiceId::new(id),
            uuid: Uuid::new_v4(),
            regie_id,
            pool_id,
            number,
            formatted_number,
            label,
            total_amount: Amount::zero(),
            paid_amount: Amount::zero(),
            remaining_amount: Amount::zero(),
            payer,
            dates,
            origin,
            usable: true,
            previous_invoice_id,
            payment_callback_url,
            cancel_callback_url,
            cancellation: None,
            collection_id: None,
            created_at: now,
        };
        tables.invoices.insert(id, invoice.clone());
        Ok(invoice)
    }

    async fn insert_invoice_line(
        &self,
        invoice_id: InvoiceId,
        line: NewLine,
        total_amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<InvoiceLine, StoreError> {
        let mut tables = self.lock();
        if !tables.invoices.contains_key(&invoice_id.value()) {
            return Err(StoreError::not_found("Invoice", invoice_id));
        }
        let id = tables.next_id("invoice_lines");
        let invoice_line = InvoiceLine {
            id: core_kernel::InvoiceLineId::new(id),
            uuid: Uuid::new_v4(),
            invoice_id,
            pool_id: line.pool_id,
            event_date: line.event_date,
            label: line.label,
            quantity: line.quantity,
            unit_amount: line.unit_amount,
            total_amount,
            paid_amount: Amount::zero(),
            remaining_amount: total_amount,
            description: line.description,
            event_slug: line.event_slug,
            event_label: line.event_label,
            agenda_slug: line.agenda_slug,
            activity_label: line.activity_label,
            accounting_code: line.accounting_code,
            details: line.details,
            user: line.user,
            created_at: now,
        };
        tables.invoice_lines.insert(id, invoice_line.clone());
        Ok(invoice_line)
    }

    async fn invoice(&self, id: InvoiceId) -> Result<Invoice, StoreError> {
        self.lock()
            .invoices
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("Invoice", id))
    }

    async fn invoice_by_uuid(&self, uuid: Uuid) -> Result<Invoice, StoreError> {
        self.lock()
            .invoices
            .values()
            .find(|i| i.uuid == uuid)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Invoice", uuid))
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let id = invoice.id.value();
        if !tables.invoices.contains_key(&id) {
            return Err(StoreError::not_found("Invoice", invoice.id));
        }
        tables.invoices.insert(id, invoice.clone());
        Ok(())
    }

    async fn lines_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<InvoiceLine>, StoreError> {
        Ok(self
            .lock()
            .invoice_lines
            .values()
            .filter(|l| l.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn recompute_invoice_totals(&self, invoice_id: InvoiceId) -> Result<Invoice, StoreError> {
        recompute_invoice(&mut self.lock(), invoice_id)
    }

    async fn outstanding_invoices_for_payer(
        &self,
        filter: &PayerDocumentFilter,
    ) -> Result<Vec<Invoice>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .invoices
            .values()
            .filter(|i| i.regie_id == filter.regie_id)
            .filter(|i| i.payer.external_id == filter.payer_external_id)
            .filter(|i| i.usable)
            .filter(|i| i.remaining_amount.is_positive())
            .filter(|i| i.cancellation.is_none())
            .filter(|i| i.collection_id.is_none())
            .filter(|i| i.origin != Origin::Basket)
            .filter(|i| filter.due_on_or_after.map(|d| i.dates.due >= d).unwrap_or(true))
            .filter(|i| campaign_finalized(&tables, i.pool_id))
            .cloned()
            .collect())
    }

    async fn invoices_for_pool(&self, pool_id: PoolId) -> Result<Vec<Invoice>, StoreError> {
        Ok(self
            .lock()
            .invoices
            .values()
            .filter(|i| i.pool_id == Some(pool_id))
            .cloned()
            .collect())
    }

    async fn insert_credit(
        &self,
        regie_id: RegieId,
        pool_id: Option<PoolId>,
        number: u64,
        formatted_number: String,
        label: String,
        payer: domain_ledger::PayerSnapshot,
        date_publication: NaiveDate,
        date_invoicing: Option<NaiveDate>,
        origin: Origin,
        usable: bool,
        previous_invoice_id: Option<InvoiceId>,
        now: DateTime<Utc>,
    ) -> Result<Credit, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("credits");
        let credit = Credit {
            id: CreditId::new(id),
            uuid: Uuid::new_v4(),
            regie_id,
            pool_id,
            number,
            formatted_number,
            label,
            total_amount: Amount::zero(),
            assigned_amount: Amount::zero(),
            remaining_amount: Amount::zero(),
            payer,
            date_publication,
            date_invoicing,
            origin,
            usable,
            previous_invoice_id,
            cancellation: None,
            created_at: now,
        };
        tables.credits.insert(id, credit.clone());
        Ok(credit)
    }

    async fn insert_credit_line(
        &self,
        credit_id: CreditId,
        line: NewLine,
        quantity: rust_decimal::Decimal,
        total_amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<CreditLine, StoreError> {
        let mut tables = self.lock();
        if !tables.credits.contains_key(&credit_id.value()) {
            return Err(StoreError::not_found("Credit", credit_id));
        }
        let id = tables.next_id("credit_lines");
        let credit_line = CreditLine {
            id: core_kernel::CreditLineId::new(id),
            uuid: Uuid::new_v4(),
            credit_id,
            pool_id: line.pool_id,
            event_date: line.event_date,
            label: line.label,
            quantity,
            unit_amount: line.unit_amount,
            total_amount,
            description: line.description,
            event_slug: line.event_slug,
            event_label: line.event_label,
            agenda_slug: line.agenda_slug,
            activity_label: line.activity_label,
            accounting_code: line.accounting_code,
            details: line.details,
            user: line.user,
            created_at: now,
        };
        tables.credit_lines.insert(id, credit_line.clone());
        Ok(credit_line)
    }

    async fn credit(&self, id: CreditId) -> Result<Credit, StoreError> {
        self.lock()
            .credits
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("Credit", id))
    }

    async fn credit_by_uuid(&self, uuid: Uuid) -> Result<Credit, StoreError> {
        self.lock()
            .credits
            .values()
            .find(|c| c.uuid == uuid)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Credit", uuid))
    }

    async fn update_credit(&self, credit: &Credit) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let id = credit.id.value();
        if !tables.credits.contains_key(&id) {
            return Err(StoreError::not_found("Credit", credit.id));
        }
        tables.credits.insert(id, credit.clone());
        Ok(())
    }

    async fn lines_for_credit(&self, credit_id: CreditId) -> Result<Vec<CreditLine>, StoreError> {
        Ok(self
            .lock()
            .credit_lines
            .values()
            .filter(|l| l.credit_id == credit_id)
            .cloned()
            .collect())
    }

    async fn recompute_credit_totals(&self, credit_id: CreditId) -> Result<Credit, StoreError> {
        recompute_credit(&mut self.lock(), credit_id)
    }

    async fn apply_credit_assignment_amount(
        &self,
        credit_id: CreditId,
        delta: Amount,
    ) -> Result<Credit, StoreError> {
        let mut tables = self.lock();
        let credit = tables
            .credits
            .get_mut(&credit_id.value())
            .ok_or_else(|| StoreError::not_found("Credit", credit_id))?;
        let settled = credit
            .settlement()
            .apply(delta)
            .map_err(|e| StoreError::invariant(e.to_string()))?;
        credit.assigned_amount = settled.settled;
        credit.remaining_amount = settled.remaining();
        Ok(credit.clone())
    }

    async fn assignable_credits_for_payer(
        &self,
        filter: &PayerDocumentFilter,
    ) -> Result<Vec<Credit>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .credits
            .values()
            .filter(|c| c.regie_id == filter.regie_id)
            .filter(|c| c.payer.external_id == filter.payer_external_id)
            .filter(|c| c.usable && c.cancellation.is_none())
            .filter(|c| c.remaining_amount.is_positive())
            .filter(|c| campaign_finalized(&tables, c.pool_id))
            .cloned()
            .collect())
    }

    async fn credits_for_pool(&self, pool_id: PoolId) -> Result<Vec<Credit>, StoreError> {
        Ok(self
            .lock()
            .credits
            .values()
            .filter(|c| c.pool_id == Some(pool_id))
            .cloned()
            .collect())
    }

    async fn insert_payment(
        &self,
        regie_id: RegieId,
        number: u64,
        formatted_number: String,
        amount: Amount,
        payment_type_id: core_kernel::PaymentTypeId,
        payment_info: serde_json::Value,
        payer: domain_ledger::PayerSnapshot,
        date_payment: Option<NaiveDate>,
        transaction_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Payment, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("payments");
        let payment = Payment {
            id: PaymentId::new(id),
            uuid: Uuid::new_v4(),
            regie_id,
            number,
            formatted_number,
            amount,
            payment_type_id,
            payment_info,
            payer,
            date_payment,
            transaction_id,
            cancellation: None,
            docket_id: None,
            created_at: now,
        };
        tables.payments.insert(id, payment.clone());
        Ok(payment)
    }

    async fn payment(&self, id: PaymentId) -> Result<Payment, StoreError> {
        self.lock()
            .payments
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("Payment", id))
    }

    async fn payment_by_uuid(&self, uuid: Uuid) -> Result<Payment, StoreError> {
        self.lock()
            .payments
            .values()
            .find(|p| p.uuid == uuid)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Payment", uuid))
    }

    async fn update_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let id = payment.id.value();
        if !tables.payments.contains_key(&id) {
            return Err(StoreError::not_found("Payment", payment.id));
        }
        tables.payments.insert(id, payment.clone());
        Ok(())
    }

    async fn apply_line_payments(
        &self,
        payment_id: PaymentId,
        allocations: &[LineAllocation],
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, StoreError> {
        let mut tables = self.lock();
        let mut touched: BTreeSet<InvoiceId> = BTreeSet::new();

        for allocation in allocations {
            let line = tables
                .invoice_lines
                .get_mut(&allocation.line_id.value())
                .ok_or_else(|| StoreError::not_found("InvoiceLine", allocation.line_id))?;
            let settled = line
                .settlement()
                .apply(allocation.amount)
                .map_err(|e| StoreError::invariant(e.to_string()))?;
            line.paid_amount = settled.settled;
            line.remaining_amount = settled.remaining();
            touched.insert(line.invoice_id);

            let id = tables.next_id("invoice_line_payments");
            tables.invoice_line_payments.insert(
                id,
                InvoiceLinePayment {
                    id: core_kernel::InvoiceLinePaymentId::new(id),
                    payment_id,
                    line_id: allocation.line_id,
                    amount: allocation.amount,
                    created_at: now,
                },
            );
        }

        let mut updated = Vec::with_capacity(touched.len());
        for invoice_id in touched {
            updated.push(recompute_invoice(&mut tables, invoice_id)?);
        }
        Ok(updated)
    }

    async fn reverse_line_payments(
        &self,
        payment_id: PaymentId,
        _now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, StoreError> {
        let mut tables = self.lock();
        let reversals: Vec<InvoiceLinePayment> = tables
            .invoice_line_payments
            .values()
            .filter(|ilp| ilp.payment_id == payment_id)
            .cloned()
            .collect();

        let mut touched: BTreeSet<InvoiceId> = BTreeSet::new();
        for reversal in &reversals {
            let line = tables
                .invoice_lines
                .get_mut(&reversal.line_id.value())
                .ok_or_else(|| StoreError::not_found("InvoiceLine", reversal.line_id))?;
            let settled = line
                .settlement()
                .apply(-reversal.amount)
                .map_err(|e| StoreError::invariant(e.to_string()))?;
            line.paid_amount = settled.settled;
            line.remaining_amount = settled.remaining();
            touched.insert(line.invoice_id);
        }
        tables
            .invoice_line_payments
            .retain(|_, ilp| ilp.payment_id != payment_id);

        let mut updated = Vec::with_capacity(touched.len());
        for invoice_id in touched {
            updated.push(recompute_invoice(&mut tables, invoice_id)?);
        }
        Ok(updated)
    }

    async fn line_payments_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<InvoiceLinePayment>, StoreError> {
        Ok(self
            .lock()
            .invoice_line_payments
            .values()
            .filter(|ilp| ilp.payment_id == payment_id)
            .cloned()
            .collect())
    }

    async fn invoices_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<Invoice>, StoreError> {
        let tables = self.lock();
        let mut invoice_ids: BTreeSet<InvoiceId> = BTreeSet::new();
        for allocation in tables
            .invoice_line_payments
            .values()
            .filter(|ilp| ilp.payment_id == payment_id)
        {
            if let Some(line) = tables.invoice_lines.get(&allocation.line_id.value()) {
                invoice_ids.insert(line.invoice_id);
            }
        }
        Ok(invoice_ids
            .into_iter()
            .filter_map(|id| tables.invoices.get(&id.value()).cloned())
            .collect())
    }

    async fn line_payments_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<InvoiceLinePayment>, StoreError> {
        let tables = self.lock();
        let line_ids: Vec<core_kernel::InvoiceLineId> = tables
            .invoice_lines
            .values()
            .filter(|l| l.invoice_id == invoice_id)
            .map(|l| l.id)
            .collect();
        Ok(tables
            .invoice_line_payments
            .values()
            .filter(|ilp| line_ids.contains(&ilp.line_id))
            .cloned()
            .collect())
    }

    async fn insert_credit_assignment(
        &self,
        credit_id: CreditId,
        invoice_id: Option<InvoiceId>,
        refund_id: Option<core_kernel::RefundId>,
        payment_id: Option<PaymentId>,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<CreditAssignment, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("credit_assignments");
        let assignment = CreditAssignment {
            id: core_kernel::CreditAssignmentId::new(id),
            credit_id,
            invoice_id,
            refund_id,
            payment_id,
            amount,
            created_at: now,
        };
        tables.credit_assignments.insert(id, assignment.clone());
        Ok(assignment)
    }

    async fn assignments_for_credit(
        &self,
        credit_id: CreditId,
    ) -> Result<Vec<CreditAssignment>, StoreError> {
        Ok(self
            .lock()
            .credit_assignments
            .values()
            .filter(|a| a.credit_id == credit_id)
            .cloned()
            .collect())
    }

    async fn insert_refund(
        &self,
        regie_id: RegieId,
        number: u64,
        formatted_number: String,
        amount: Amount,
        payer: domain_ledger::PayerSnapshot,
        date_refund: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<Refund, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("refunds");
        let refund = Refund {
            id: core_kernel::RefundId::new(id),
            uuid: Uuid::new_v4(),
            regie_id,
            number,
            formatted_number,
            amount,
            payer,
            date_refund,
            created_at: now,
        };
        tables.refunds.insert(id, refund.clone());
        Ok(refund)
    }

    async fn refund_by_uuid(&self, uuid: Uuid) -> Result<Refund, StoreError> {
        self.lock()
            .refunds
            .values()
            .find(|r| r.uuid == uuid)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Refund", uuid))
    }

    async fn insert_invoice_cancellation_reason(
        &self,
        label: String,
        slug: String,
    ) -> Result<InvoiceCancellationReason, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("invoice_cancellation_reasons");
        let reason = CancellationReason {
            id: core_kernel::InvoiceCancellationReasonId::new(id),
            label,
            slug,
            disabled: false,
        };
        tables
            .invoice_cancellation_reasons
            .insert(id, reason.clone());
        Ok(reason)
    }

    async fn list_invoice_cancellation_reasons(
        &self,
    ) -> Result<Vec<InvoiceCancellationReason>, StoreError> {
        let mut reasons: Vec<InvoiceCancellationReason> = self
            .lock()
            .invoice_cancellation_reasons
            .values()
            .cloned()
            .collect();
        reasons.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(reasons)
    }

    async fn insert_payment_cancellation_reason(
        &self,
        label: String,
        slug: String,
    ) -> Result<PaymentCancellationReason, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("payment_cancellation_reasons");
        let reason = CancellationReason {
            id: core_kernel::PaymentCancellationReasonId::new(id),
            label,
            slug,
            disabled: false,
        };
        tables
            .payment_cancellation_reasons
            .insert(id, reason.clone());
        Ok(reason)
    }

    async fn payment_cancellation_reason(
        &self,
        id: core_kernel::PaymentCancellationReasonId,
    ) -> Result<PaymentCancellationReason, StoreError> {
        self.lock()
            .payment_cancellation_reasons
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("PaymentCancellationReason", id))
    }

    async fn insert_credit_cancellation_reason(
        &self,
        label: String,
        slug: String,
    ) -> Result<CreditCancellationReason, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("credit_cancellation_reasons");
        let reason = CancellationReason {
            id: core_kernel::CreditCancellationReasonId::new(id),
            label,
            slug,
            disabled: false,
        };
        tables
            .credit_cancellation_reasons
            .insert(id, reason.clone());
        Ok(reason)
    }

    async fn invoice_cancellation_reason(
        &self,
        id: core_kernel::InvoiceCancellationReasonId,
    ) -> Result<InvoiceCancellationReason, StoreError> {
        self.lock()
            .invoice_cancellation_reasons
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("InvoiceCancellationReason", id))
    }

    async fn credit_cancellation_reason(
        &self,
        id: core_kernel::CreditCancellationReasonId,
    ) -> Result<CreditCancellationReason, StoreError> {
        self.lock()
            .credit_cancellation_reasons
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("CreditCancellationReason", id))
    }

    async fn insert_payment_docket(
        &self,
        regie_id: RegieId,
        date_end: NaiveDate,
        payment_type_ids: Vec<core_kernel::PaymentTypeId>,
        now: DateTime<Utc>,
    ) -> Result<PaymentDocket, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("payment_dockets");
        let docket = PaymentDocket {
            id: PaymentDocketId::new(id),
            uuid: Uuid::new_v4(),
            regie_id,
            number: 0,
            formatted_number: String::new(),
            date_end,
            draft: true,
            payment_type_ids,
            created_at: now,
        };
        tables.payment_dockets.insert(id, docket.clone());
        Ok(docket)
    }

    async fn update_payment_docket(&self, docket: &PaymentDocket) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let id = docket.id.value();
        if !tables.payment_dockets.contains_key(&id) {
            return Err(StoreError::not_found("PaymentDocket", docket.id));
        }
        tables.payment_dockets.insert(id, docket.clone());
        Ok(())
    }

    async fn payment_docket(&self, id: PaymentDocketId) -> Result<PaymentDocket, StoreError> {
        self.lock()
            .payment_dockets
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("PaymentDocket", id))
    }

    async fn docketable_payments(
        &self,
        docket: &PaymentDocket,
    ) -> Result<Vec<Payment>, StoreError> {
        Ok(self
            .lock()
            .payments
            .values()
            .filter(|p| p.regie_id == docket.regie_id)
            .filter(|p| p.docket_id.is_none())
            .filter(|p| p.cancellation.is_none())
            .filter(|p| docket.payment_type_ids.contains(&p.payment_type_id))
            .filter(|p| p.payment_date() <= docket.date_end)
            .cloned()
            .collect())
    }

    async fn payments_for_docket(
        &self,
        docket_id: PaymentDocketId,
    ) -> Result<Vec<Payment>, StoreError> {
        Ok(self
            .lock()
            .payments
            .values()
            .filter(|p| p.docket_id == Some(docket_id))
            .cloned()
            .collect())
    }

    async fn insert_collection_docket(
        &self,
        regie_id: RegieId,
        date_end: NaiveDate,
        pay_invoices: bool,
        now: DateTime<Utc>,
    ) -> Result<CollectionDocket, StoreError> {
        let mut tables = self.lock();
        let id = tables.next_id("collection_dockets");
        let docket = CollectionDocket {
            id: CollectionDocketId::new(id),
            uuid: Uuid::new_v4(),
            regie_id,
            number: 0,
            formatted_number: String::new(),
            date_end,
            draft: true,
            pay_invoices,
            created_at: now,
        };
        tables.collection_dockets.insert(id, docket.clone());
        Ok(docket)
    }

    async fn update_collection_docket(&self, docket: &CollectionDocket) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let id = docket.id.value();
        if !tables.collection_dockets.contains_key(&id) {
            return Err(StoreError::not_found("CollectionDocket", docket.id));
        }
        tables.collection_dockets.insert(id, docket.clone());
        Ok(())
    }

    async fn collection_docket(
        &self,
        id: CollectionDocketId,
    ) -> Result<CollectionDocket, StoreError> {
        self.lock()
            .collection_dockets
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("CollectionDocket", id))
    }

    async fn invoices_for_collection(
        &self,
        collection_id: CollectionDocketId,
    ) -> Result<Vec<Invoice>, StoreError> {
        Ok(self
            .lock()
            .invoices
            .values()
            .filter(|i| i.collection_id == Some(collection_id))
            .cloned()
            .collect())
    }

    async fn collectable_invoices(
        &self,
        regie_id: RegieId,
        due_before: NaiveDate,
    ) -> Result<Vec<Invoice>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .invoices
            .values()
            .filter(|i| i.regie_id == regie_id)
            .filter(|i| i.remaining_amount.is_positive())
            .filter(|i| i.cancellation.is_none())
            .filter(|i| i.collection_id.is_none())
            .filter(|i| i.origin != Origin::Basket)
            .filter(|i| i.dates.due < due_before)
            .filter(|i| campaign_finalized(&tables, i.pool_id))
            .cloned()
            .collect())
    }
}
