//! Ledger settlement service
//!
//! All money movement goes through this service: draft promotion with
//! counter-backed numbering, the deterministic payment allocation algorithm,
//! full payment reversal, credit assignment in both directions, refunds and
//! dockets. Settlement mutations happen inside single store operations so
//! the paid/remaining invariants hold at every observable point.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use core_kernel::{
    Amount, CollectionDocketId, CreditId, DraftInvoiceId, InvoiceId, InvoiceLineId,
    PaymentCancellationReasonId, PaymentDocketId, PaymentId, PaymentTypeId, RegieId, Clock,
    CreditCancellationReasonId, InvoiceCancellationReasonId,
};
use domain_callback::{CallbackService, TargetRef};
use domain_regie::{set_numbers, CounterKind, CounterPort, RegieStore};

use crate::credit::{Credit, Refund};
use crate::error::{FieldError, LedgerError};
use crate::invoice::{CancellationInfo, Invoice, Origin};
use crate::journal::InjectedLine;
use crate::payment::{CollectionDocket, Payment, PaymentDocket};
use crate::snapshot::PayerSnapshot;
use crate::store::{LedgerStore, LineAllocation, NewLine, PayerDocumentFilter};

/// A promoted draft document with its draft-line to final-line mapping
#[derive(Debug, Clone)]
pub enum FinalizedDocument {
    Invoice {
        invoice: Invoice,
        line_map: Vec<(core_kernel::DraftInvoiceLineId, InvoiceLineId)>,
    },
    Credit {
        credit: Credit,
        line_map: Vec<(core_kernel::DraftInvoiceLineId, core_kernel::CreditLineId)>,
    },
}

/// Input for recording a payment
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub regie_id: RegieId,
    pub amount: Amount,
    pub payment_type_id: PaymentTypeId,
    /// Invoices the payment targets, consumed in id order
    pub invoice_ids: Vec<InvoiceId>,
    /// Restricts allocation to these lines when set
    pub line_scope: Option<Vec<InvoiceLineId>>,
    pub payment_info: serde_json::Value,
    pub date_payment: Option<NaiveDate>,
    pub transaction_id: Option<String>,
}

impl PaymentRequest {
    pub fn new(
        regie_id: RegieId,
        amount: Amount,
        payment_type_id: PaymentTypeId,
        invoice_ids: Vec<InvoiceId>,
    ) -> Self {
        Self {
            regie_id,
            amount,
            payment_type_id,
            invoice_ids,
            line_scope: None,
            payment_info: serde_json::Value::Object(Default::default()),
            date_payment: None,
            transaction_id: None,
        }
    }
}

/// Ledger operations over the persistence and numbering ports
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    regies: Arc<dyn RegieStore>,
    counters: Arc<dyn CounterPort>,
    callbacks: Arc<CallbackService>,
    clock: Arc<dyn Clock>,
}

impl LedgerService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        regies: Arc<dyn RegieStore>,
        counters: Arc<dyn CounterPort>,
        callbacks: Arc<CallbackService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            regies,
            counters,
            callbacks,
            clock,
        }
    }

    // -- injected lines

    /// Records a manually injected charge or credit line
    pub async fn create_injected_line(
        &self,
        regie_id: RegieId,
        event_date: NaiveDate,
        slug: &str,
        label: &str,
        amount: Amount,
        user_external_id: &str,
        payer: PayerSnapshot,
    ) -> Result<InjectedLine, LedgerError> {
        let mut errors = Vec::new();
        if slug.is_empty() {
            errors.push(FieldError::required("slug"));
        }
        if label.is_empty() {
            errors.push(FieldError::required("label"));
        }
        if user_external_id.is_empty() {
            errors.push(FieldError::required("user_external_id"));
        }
        if payer.external_id.is_empty() {
            errors.push(FieldError::required("payer_external_id"));
        }
        if !errors.is_empty() {
            return Err(LedgerError::Validation(errors));
        }

        let line = self
            .store
            .insert_injected_line(
                regie_id,
                event_date,
                slug.to_string(),
                label.to_string(),
                amount,
                user_external_id.to_string(),
                payer,
                self.clock.now(),
            )
            .await?;
        Ok(line)
    }

    /// Marks an erroneous journal line as triaged
    ///
    /// Error lines are never billed; marking them ignored or fixed is the
    /// manual follow-up recorded for the operator audit trail.
    pub async fn set_journal_line_error_status(
        &self,
        line_id: core_kernel::JournalLineId,
        error_status: Option<crate::journal::ErrorStatus>,
    ) -> Result<crate::journal::JournalLine, LedgerError> {
        let mut line = self.store.journal_line(line_id).await?;
        if line.data.status == crate::journal::LineStatus::Success {
            return Err(LedgerError::invalid("journal line is not in error"));
        }
        line.error_status = error_status;
        self.store.update_journal_line(&line).await?;
        Ok(line)
    }

    /// Per-invoice payment view aggregated from the line allocations
    pub async fn invoice_payments(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<crate::payment::InvoicePayment>, LedgerError> {
        let mut by_payment: Vec<crate::payment::InvoicePayment> = Vec::new();
        for allocation in self.store.line_payments_for_invoice(invoice_id).await? {
            match by_payment
                .iter_mut()
                .find(|ip| ip.payment_id == allocation.payment_id)
            {
                Some(entry) => {
                    entry.amount = entry.amount.checked_add(allocation.amount)?;
                }
                None => by_payment.push(crate::payment::InvoicePayment {
                    payment_id: allocation.payment_id,
                    invoice_id,
                    amount: allocation.amount,
                }),
            }
        }
        Ok(by_payment)
    }

    // -- draft promotion

    /// Promotes a draft invoice into a final invoice or credit
    ///
    /// Positive (or zero) totals become invoices; negative totals become
    /// credits with inverted line quantities so the credit total is positive.
    /// The counter number is allocated here and never earlier. `pool_id`
    /// overrides the pool the final document belongs to (the final pool
    /// during promotion, the draft's own pool otherwise).
    pub async fn finalize_draft_invoice(
        &self,
        draft_id: DraftInvoiceId,
        pool_id: Option<core_kernel::PoolId>,
    ) -> Result<FinalizedDocument, LedgerError> {
        let mut draft = self.store.draft_invoice(draft_id).await?;
        let mut lines = self.store.draft_invoice_lines(draft_id).await?;
        if let Some(pool_id) = pool_id {
            draft.pool_id = Some(pool_id);
            for line in &mut lines {
                line.pool_id = Some(pool_id);
            }
        }
        let total: Amount = lines.iter().map(|l| l.total_amount).sum();

        if total.is_negative() {
            self.promote_into_credit(draft, lines).await
        } else {
            self.promote_into_invoice(draft, lines).await
        }
    }

    async fn promote_into_invoice(
        &self,
        draft: crate::invoice::DraftInvoice,
        lines: Vec<crate::invoice::DraftInvoiceLine>,
    ) -> Result<FinalizedDocument, LedgerError> {
        let regie = self.regies.regie(draft.regie_id).await?;
        let date = draft
            .dates
            .invoicing
            .unwrap_or_else(|| self.clock.today());
        let (number, formatted_number) =
            set_numbers(&*self.counters, &regie, date, CounterKind::Invoice).await?;

        let invoice = self
            .store
            .insert_invoice(
                draft.regie_id,
                draft.pool_id,
                number,
                formatted_number,
                draft.label.clone(),
                draft.payer.clone(),
                draft.dates,
                draft.origin,
                draft.previous_invoice_id,
                draft.payment_callback_url.clone(),
                draft.cancel_callback_url.clone(),
                self.clock.now(),
            )
            .await?;

        let mut line_map = Vec::with_capacity(lines.len());
        for line in lines {
            let draft_line_id = line.id;
            let total = line.total_amount;
            let final_line = self
                .store
                .insert_invoice_line(
                    invoice.id,
                    new_line_from_draft(&line),
                    total,
                    self.clock.now(),
                )
                .await?;
            line_map.push((draft_line_id, final_line.id));
        }

        let invoice = self.store.recompute_invoice_totals(invoice.id).await?;
        info!(invoice = %invoice.formatted_number, total = %invoice.total_amount, "invoice finalized");
        Ok(FinalizedDocument::Invoice { invoice, line_map })
    }

    async fn promote_into_credit(
        &self,
        draft: crate::invoice::DraftInvoice,
        lines: Vec<crate::invoice::DraftInvoiceLine>,
    ) -> Result<FinalizedDocument, LedgerError> {
        let regie = self.regies.regie(draft.regie_id).await?;
        let date = draft
            .dates
            .invoicing
            .unwrap_or_else(|| self.clock.today());
        let (number, formatted_number) =
            set_numbers(&*self.counters, &regie, date, CounterKind::Credit).await?;

        let label = format!("Credit from {}", self.clock.today().format("%d/%m/%Y"));
        let credit = self
            .store
            .insert_credit(
                draft.regie_id,
                draft.pool_id,
                number,
                formatted_number,
                label,
                draft.payer.clone(),
                draft.dates.publication,
                draft.dates.invoicing,
                draft.origin,
                true,
                draft.previous_invoice_id,
                self.clock.now(),
            )
            .await?;

        let mut line_map = Vec::with_capacity(lines.len());
        for line in lines {
            let draft_line_id = line.id;
            // inverse quantities, so the credit total amount is positive
            let quantity = -line.quantity;
            let total = -line.total_amount;
            let final_line = self
                .store
                .insert_credit_line(
                    credit.id,
                    new_line_from_draft(&line),
                    quantity,
                    total,
                    self.clock.now(),
                )
                .await?;
            line_map.push((draft_line_id, final_line.id));
        }

        let credit = self.store.recompute_credit_totals(credit.id).await?;
        info!(credit = %credit.formatted_number, total = %credit.total_amount, "credit finalized");

        // standalone credits are spent on the payer's outstanding invoices
        // right away; campaign credits wait for the validation job
        if draft.origin != Origin::Campaign {
            self.assign_credits_for_credit(credit.id, false).await?;
        }
        let credit = self.store.credit(credit.id).await?;
        Ok(FinalizedDocument::Credit { credit, line_map })
    }

    // -- payments

    /// Records a payment and allocates it line by line
    ///
    /// Invoices are consumed in id order, and within each invoice its lines
    /// in id order. Each line receives the lesser (by magnitude) of its
    /// remaining amount and what is left of the payment, signed like the
    /// line. Invoice totals are recomputed in the same store mutation as the
    /// allocations. Invoices that end up fully paid trigger a `payment`
    /// callback.
    pub async fn make_payment(&self, request: PaymentRequest) -> Result<Payment, LedgerError> {
        if !request.amount.is_positive() {
            return Err(LedgerError::invalid("payment amount must be positive"));
        }
        if request.invoice_ids.is_empty() {
            return Err(LedgerError::invalid("payment requires at least one invoice"));
        }

        let invoice_ids: BTreeSet<InvoiceId> = request.invoice_ids.iter().copied().collect();
        let mut invoices = Vec::with_capacity(invoice_ids.len());
        for id in invoice_ids {
            invoices.push(self.store.invoice(id).await?);
        }

        let regie = self.regies.regie(request.regie_id).await?;
        let date = request.date_payment.unwrap_or_else(|| self.clock.today());
        let (number, formatted_number) =
            set_numbers(&*self.counters, &regie, date, CounterKind::Payment).await?;

        let payer = invoices[0].payer.clone();
        let payment = self
            .store
            .insert_payment(
                request.regie_id,
                number,
                formatted_number,
                request.amount,
                request.payment_type_id,
                request.payment_info.clone(),
                payer,
                request.date_payment,
                request.transaction_id.clone(),
                self.clock.now(),
            )
            .await?;

        let allocations = self
            .compute_allocations(&invoices, request.line_scope.as_deref(), request.amount)
            .await?;

        let updated = self
            .store
            .apply_line_payments(payment.id, &allocations, self.clock.now())
            .await?;

        debug!(
            payment = %payment.formatted_number,
            allocations = allocations.len(),
            "payment allocated"
        );

        for invoice in updated.iter().filter(|i| i.is_paid()) {
            let _ = self
                .callbacks
                .notify(
                    TargetRef::invoice(invoice.id.value()),
                    "payment",
                    invoice.payment_notification_payload(payment.uuid),
                )
                .await;
        }

        Ok(payment)
    }

    /// The line-level allocation algorithm
    async fn compute_allocations(
        &self,
        invoices: &[Invoice],
        line_scope: Option<&[InvoiceLineId]>,
        amount: Amount,
    ) -> Result<Vec<LineAllocation>, LedgerError> {
        let mut allocations = Vec::new();
        let mut left = amount;

        'outer: for invoice in invoices {
            if invoice.remaining_amount.is_zero() {
                // nothing to pay for this invoice
                continue;
            }
            let lines = self.store.lines_for_invoice(invoice.id).await?;
            for line in lines {
                if let Some(scope) = line_scope {
                    if !scope.contains(&line.id) {
                        continue;
                    }
                }
                let remaining = line.remaining_amount;
                if remaining.is_zero() {
                    continue;
                }
                let paid = remaining.capped_at_magnitude(left);
                allocations.push(LineAllocation {
                    line_id: line.id,
                    amount: paid,
                });
                left = left.checked_sub(paid)?;
                if !left.is_positive() {
                    break 'outer;
                }
            }
        }

        Ok(allocations)
    }

    /// Cancels a payment, reversing every one of its line allocations
    ///
    /// A cancellation reason is mandatory. Reversal and the invoice total
    /// recomputation happen in one store mutation; a partially reversed
    /// payment is never observable.
    pub async fn cancel_payment(
        &self,
        payment_id: PaymentId,
        reason_id: PaymentCancellationReasonId,
        cancelled_by: Option<String>,
        description: String,
    ) -> Result<Payment, LedgerError> {
        let mut payment = self.store.payment(payment_id).await?;
        if payment.is_cancelled() {
            return Err(LedgerError::invalid("payment is already cancelled"));
        }
        let reason = self.store.payment_cancellation_reason(reason_id).await?;
        if let Some(docket_id) = payment.docket_id {
            let docket = self.store.payment_docket(docket_id).await?;
            if !docket.draft {
                return Err(LedgerError::invalid(
                    "payment belongs to a finalized docket",
                ));
            }
        }
        for invoice in self.store.invoices_for_payment(payment.id).await? {
            if invoice.collection_id.is_some() {
                return Err(LedgerError::invalid("payment pays collected invoices"));
            }
        }

        let updated = self
            .store
            .reverse_line_payments(payment.id, self.clock.now())
            .await?;

        payment.cancellation = Some(CancellationInfo {
            cancelled_at: self.clock.now(),
            cancelled_by,
            reason_id: reason.id,
            description,
        });
        self.store.update_payment(&payment).await?;
        info!(payment = %payment.formatted_number, reason = %reason.slug, "payment cancelled");

        for invoice in &updated {
            let _ = self
                .callbacks
                .notify(
                    TargetRef::invoice(invoice.id.value()),
                    "cancel",
                    invoice.cancel_notification_payload(),
                )
                .await;
        }

        Ok(payment)
    }

    // -- credit assignment

    /// Applies a credit against an invoice
    ///
    /// Creates a credit-typed payment for the assigned amount (allocated
    /// through the normal line algorithm) and records the assignment.
    /// Returns the assigned amount, or `None` when either side has nothing
    /// left.
    pub async fn assign_credit(
        &self,
        invoice_id: InvoiceId,
        credit_id: CreditId,
        amount_to_pay: Option<Amount>,
    ) -> Result<Option<Amount>, LedgerError> {
        let invoice = self.store.invoice(invoice_id).await?;
        if !invoice.is_payable() {
            return Ok(None);
        }
        let credit = self.store.credit(credit_id).await?;
        if !credit.is_assignable() {
            return Ok(None);
        }

        let target = amount_to_pay.unwrap_or(invoice.remaining_amount);
        let paid_amount = credit.remaining_amount.capped_at_magnitude(target);
        if !paid_amount.is_positive() {
            return Ok(None);
        }

        let payment_type = self
            .regies
            .payment_type_get_or_create(invoice.regie_id, "credit", "Credit")
            .await?;
        let payment = self
            .make_payment(PaymentRequest::new(
                invoice.regie_id,
                paid_amount,
                payment_type.id,
                vec![invoice.id],
            ))
            .await?;

        self.store
            .insert_credit_assignment(
                credit.id,
                Some(invoice.id),
                None,
                Some(payment.id),
                paid_amount,
                self.clock.now(),
            )
            .await?;
        self.store
            .apply_credit_assignment_amount(credit.id, paid_amount)
            .await?;

        Ok(Some(paid_amount))
    }

    /// Pays an invoice from the payer's assignable credits, oldest first
    pub async fn assign_credits_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<usize, LedgerError> {
        let invoice = self.store.invoice(invoice_id).await?;
        if invoice.dates.due < self.clock.today() {
            return Ok(0);
        }
        let credits = self
            .store
            .assignable_credits_for_payer(&PayerDocumentFilter {
                regie_id: invoice.regie_id,
                payer_external_id: invoice.payer.external_id.clone(),
                due_on_or_after: None,
            })
            .await?;

        let mut assigned = 0;
        let mut amount_to_pay = invoice.remaining_amount;
        for credit in credits {
            let invoice = self.store.invoice(invoice_id).await?;
            if invoice.remaining_amount.is_zero() {
                break;
            }
            if let Some(paid) = self
                .assign_credit(invoice_id, credit.id, Some(amount_to_pay))
                .await?
            {
                amount_to_pay = amount_to_pay.checked_sub(paid)?;
                assigned += 1;
            }
            if !amount_to_pay.is_positive() {
                break;
            }
        }
        Ok(assigned)
    }

    /// Spends a credit on the payer's outstanding invoices, oldest first
    ///
    /// Gated by the regie's `assign_credits_on_creation` flag unless forced
    /// (campaign validation always assigns).
    pub async fn assign_credits_for_credit(
        &self,
        credit_id: CreditId,
        force_assignation: bool,
    ) -> Result<usize, LedgerError> {
        let credit = self.store.credit(credit_id).await?;
        if !credit.usable {
            return Ok(0);
        }
        if !force_assignation {
            let regie = self.regies.regie(credit.regie_id).await?;
            if !regie.assign_credits_on_creation {
                return Ok(0);
            }
        }

        let invoices = self
            .store
            .outstanding_invoices_for_payer(&PayerDocumentFilter {
                regie_id: credit.regie_id,
                payer_external_id: credit.payer.external_id.clone(),
                due_on_or_after: Some(self.clock.today()),
            })
            .await?;

        let mut assigned = 0;
        for invoice in invoices {
            let credit = self.store.credit(credit_id).await?;
            if credit.remaining_amount.is_zero() {
                break;
            }
            if self
                .assign_credit(invoice.id, credit_id, None)
                .await?
                .is_some()
            {
                assigned += 1;
            }
        }
        Ok(assigned)
    }

    // -- refunds

    /// Pays out a credit's remaining balance externally
    pub async fn make_refund(
        &self,
        credit_id: CreditId,
        date_refund: Option<NaiveDate>,
    ) -> Result<Refund, LedgerError> {
        let credit = self.store.credit(credit_id).await?;
        if !credit.is_assignable() {
            return Err(LedgerError::invalid("credit has no refundable balance"));
        }
        let amount = credit.remaining_amount;

        let regie = self.regies.regie(credit.regie_id).await?;
        let date = date_refund.unwrap_or_else(|| self.clock.today());
        let (number, formatted_number) =
            set_numbers(&*self.counters, &regie, date, CounterKind::Refund).await?;

        let refund = self
            .store
            .insert_refund(
                credit.regie_id,
                number,
                formatted_number,
                amount,
                credit.payer.clone(),
                date_refund,
                self.clock.now(),
            )
            .await?;
        self.store
            .insert_credit_assignment(
                credit.id,
                None,
                Some(refund.id),
                None,
                amount,
                self.clock.now(),
            )
            .await?;
        self.store
            .apply_credit_assignment_amount(credit.id, amount)
            .await?;

        info!(refund = %refund.formatted_number, amount = %amount, "credit refunded");
        Ok(refund)
    }

    // -- cancellations

    /// Cancels an invoice that has no recorded payments
    pub async fn cancel_invoice(
        &self,
        invoice_id: InvoiceId,
        reason_id: InvoiceCancellationReasonId,
        cancelled_by: Option<String>,
        description: String,
    ) -> Result<Invoice, LedgerError> {
        let mut invoice = self.store.invoice(invoice_id).await?;
        if invoice.is_cancelled() {
            return Err(LedgerError::invalid("invoice is already cancelled"));
        }
        if !invoice.paid_amount.is_zero() {
            return Err(LedgerError::invalid("invoice has payments"));
        }
        if invoice.collection_id.is_some() {
            return Err(LedgerError::invalid("invoice is under collection"));
        }
        let reason = self.store.invoice_cancellation_reason(reason_id).await?;

        invoice.cancellation = Some(CancellationInfo {
            cancelled_at: self.clock.now(),
            cancelled_by,
            reason_id: reason.id,
            description,
        });
        self.store.update_invoice(&invoice).await?;
        info!(invoice = %invoice.formatted_number, reason = %reason.slug, "invoice cancelled");

        let _ = self
            .callbacks
            .notify(
                TargetRef::invoice(invoice.id.value()),
                "cancel",
                invoice.cancel_notification_payload(),
            )
            .await;

        Ok(invoice)
    }

    /// Cancels a credit with no assignments
    pub async fn cancel_credit(
        &self,
        credit_id: CreditId,
        reason_id: CreditCancellationReasonId,
        cancelled_by: Option<String>,
        description: String,
    ) -> Result<Credit, LedgerError> {
        let mut credit = self.store.credit(credit_id).await?;
        if credit.is_cancelled() {
            return Err(LedgerError::invalid("credit is already cancelled"));
        }
        if !credit.assigned_amount.is_zero() {
            return Err(LedgerError::invalid("credit has assignments"));
        }
        let reason = self.store.credit_cancellation_reason(reason_id).await?;

        credit.cancellation = Some(CancellationInfo {
            cancelled_at: self.clock.now(),
            cancelled_by,
            reason_id: reason.id,
            description,
        });
        self.store.update_credit(&credit).await?;
        info!(credit = %credit.formatted_number, reason = %reason.slug, "credit cancelled");
        Ok(credit)
    }

    // -- dockets

    /// Opens a draft payment docket collecting eligible payments
    pub async fn make_payment_docket(
        &self,
        regie_id: RegieId,
        date_end: NaiveDate,
        payment_type_ids: Vec<PaymentTypeId>,
    ) -> Result<PaymentDocket, LedgerError> {
        let docket = self
            .store
            .insert_payment_docket(regie_id, date_end, payment_type_ids, self.clock.now())
            .await?;
        for mut payment in self.store.docketable_payments(&docket).await? {
            payment.docket_id = Some(docket.id);
            self.store.update_payment(&payment).await?;
        }
        Ok(docket)
    }

    /// Numbers a draft payment docket and makes it final
    pub async fn finalize_payment_docket(
        &self,
        docket_id: PaymentDocketId,
    ) -> Result<PaymentDocket, LedgerError> {
        let mut docket = self.store.payment_docket(docket_id).await?;
        if !docket.draft {
            return Err(LedgerError::invalid("docket is already finalized"));
        }
        let regie = self.regies.regie(docket.regie_id).await?;
        let date = docket.created_at.date_naive();
        let (number, formatted_number) =
            set_numbers(&*self.counters, &regie, date, CounterKind::Docket).await?;
        docket.number = number;
        docket.formatted_number = formatted_number;
        docket.draft = false;
        self.store.update_payment_docket(&docket).await?;
        Ok(docket)
    }

    /// Opens a draft collection docket over overdue invoices
    pub async fn make_collection_docket(
        &self,
        regie_id: RegieId,
        date_end: NaiveDate,
        pay_invoices: bool,
    ) -> Result<CollectionDocket, LedgerError> {
        let docket = self
            .store
            .insert_collection_docket(regie_id, date_end, pay_invoices, self.clock.now())
            .await?;
        for mut invoice in self.store.collectable_invoices(regie_id, date_end).await? {
            invoice.collection_id = Some(docket.id);
            self.store.update_invoice(&invoice).await?;
        }
        Ok(docket)
    }

    /// Numbers a collection docket; optionally settles the collected
    /// invoices with collect-typed payments
    pub async fn finalize_collection_docket(
        &self,
        collection_id: CollectionDocketId,
    ) -> Result<CollectionDocket, LedgerError> {
        let mut docket = self.store.collection_docket(collection_id).await?;
        if !docket.draft {
            return Err(LedgerError::invalid("collection is already finalized"));
        }
        let regie = self.regies.regie(docket.regie_id).await?;
        let date = docket.created_at.date_naive();
        let (number, formatted_number) =
            set_numbers(&*self.counters, &regie, date, CounterKind::Collection).await?;
        docket.number = number;
        docket.formatted_number = formatted_number;
        docket.draft = false;
        self.store.update_collection_docket(&docket).await?;

        if docket.pay_invoices {
            let payment_type = self
                .regies
                .payment_type_get_or_create(docket.regie_id, "collect", "Collect")
                .await?;
            for invoice in self.store.invoices_for_collection(docket.id).await? {
                if invoice.remaining_amount.is_positive() {
                    self.make_payment(PaymentRequest::new(
                        docket.regie_id,
                        invoice.remaining_amount,
                        payment_type.id,
                        vec![invoice.id],
                    ))
                    .await?;
                }
            }
        }

        Ok(docket)
    }
}

/// Copies a draft line's payload for insertion as a final line
fn new_line_from_draft(line: &crate::invoice::DraftInvoiceLine) -> NewLine {
    NewLine {
        pool_id: line.pool_id,
        event_date: line.event_date,
        label: line.label.clone(),
        quantity: line.quantity,
        unit_amount: line.unit_amount,
        description: line.description.clone(),
        event_slug: line.event_slug.clone(),
        event_label: line.event_label.clone(),
        agenda_slug: line.agenda_slug.clone(),
        activity_label: line.activity_label.clone(),
        accounting_code: line.accounting_code.clone(),
        details: line.details.clone(),
        user: line.user.clone(),
    }
}
