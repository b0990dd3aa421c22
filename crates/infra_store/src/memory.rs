//! The in-memory store
//!
//! One mutex guards the whole table set: every port method locks, mutates
//! and releases without awaiting, so each call is one atomic "transaction".
//! Claim methods are conditional updates under that lock, so at most one of
//! any number of concurrent claimants wins. Row ids ascend strictly per
//! table; id order is creation order everywhere the domain relies on it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use domain_callback::Callback;
use domain_campaign::{Campaign, CampaignJob, Pool, PoolJob};
use domain_ledger::{
    CollectionDocket, Credit, CreditAssignment, CreditCancellationReason, CreditLine,
    DraftInvoice, DraftInvoiceLine, InjectedLine, Invoice, InvoiceCancellationReason, InvoiceLine,
    InvoiceLinePayment, JournalLine, Payment, PaymentCancellationReason, PaymentDocket, Refund,
};
use domain_regie::{CounterKind, PaymentType, Regie};

/// All tables, guarded together
#[derive(Default)]
pub(crate) struct Tables {
    next_ids: HashMap<&'static str, u64>,

    pub regies: BTreeMap<u64, Regie>,
    pub payment_types: BTreeMap<u64, PaymentType>,
    pub counters: HashMap<(u64, String, CounterKind), u64>,

    pub callbacks: BTreeMap<u64, Callback>,

    pub campaigns: BTreeMap<u64, Campaign>,
    pub pools: BTreeMap<u64, Pool>,
    /// Jobs share one sequence so creation order interleaves across kinds
    pub campaign_jobs: BTreeMap<u64, CampaignJob>,
    pub campaign_job_index: HashMap<Uuid, u64>,
    pub pool_jobs: BTreeMap<u64, PoolJob>,
    pub pool_job_index: HashMap<Uuid, u64>,

    pub injected_lines: BTreeMap<u64, InjectedLine>,
    pub journal_lines: BTreeMap<u64, JournalLine>,
    pub draft_invoices: BTreeMap<u64, DraftInvoice>,
    pub draft_invoice_lines: BTreeMap<u64, DraftInvoiceLine>,
    pub invoices: BTreeMap<u64, Invoice>,
    pub invoice_lines: BTreeMap<u64, InvoiceLine>,
    pub credits: BTreeMap<u64, Credit>,
    pub credit_lines: BTreeMap<u64, CreditLine>,
    pub payments: BTreeMap<u64, Payment>,
    pub invoice_line_payments: BTreeMap<u64, InvoiceLinePayment>,
    pub credit_assignments: BTreeMap<u64, CreditAssignment>,
    pub refunds: BTreeMap<u64, Refund>,

    pub invoice_cancellation_reasons: BTreeMap<u64, InvoiceCancellationReason>,
    pub payment_cancellation_reasons: BTreeMap<u64, PaymentCancellationReason>,
    pub credit_cancellation_reasons: BTreeMap<u64, CreditCancellationReason>,

    pub payment_dockets: BTreeMap<u64, PaymentDocket>,
    pub collection_dockets: BTreeMap<u64, CollectionDocket>,
}

impl Tables {
    /// Allocates the next id for a table; ids start at 1 and never repeat
    pub fn next_id(&mut self, table: &'static str) -> u64 {
        let counter = self.next_ids.entry(table).or_insert(0);
        *counter += 1;
        *counter
    }
}

/// Shared in-memory store implementing every domain persistence port
#[derive(Clone)]
pub struct MemoryStore {
    pub(crate) tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Tables> {
        // a poisoned lock means a panic mid-mutation; propagating the panic
        // is the only sound option for an in-memory store
        self.tables.lock().expect("memory store lock poisoned")
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
