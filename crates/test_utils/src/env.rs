//! Assembled test environment
//!
//! Wires the in-memory store and every service over a pinned clock, a
//! recording sink and a scriptable pricing engine, the same way the server
//! binary wires production collaborators.

use std::sync::Arc;

use core_kernel::{Amount, Clock, FixedClock};
use domain_callback::{CallbackConfig, CallbackService};
use domain_campaign::{CampaignService, JobRunner, RunnerConfig};
use domain_ledger::{
    FinalizedDocument, Invoice, InvoiceDates, LedgerService, LedgerStore, NewDraftInvoice,
    NewLine, Origin, PayerSnapshot, UserSnapshot,
};
use domain_regie::{Regie, RegieStore};
use infra_store::MemoryStore;

use crate::builders::RegieBuilder;
use crate::fixtures::TemporalFixtures;
use crate::mocks::{RecordingSink, StaticPricing};

pub struct TestEnv {
    pub store: MemoryStore,
    pub clock: Arc<FixedClock>,
    pub sink: Arc<RecordingSink>,
    pub pricing: Arc<StaticPricing>,
    pub callbacks: Arc<CallbackService>,
    pub ledger: Arc<LedgerService>,
    pub campaigns: Arc<CampaignService>,
    pub runner: Arc<JobRunner>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_configs(CallbackConfig::default(), RunnerConfig::default())
    }

    pub fn with_configs(callback_config: CallbackConfig, runner_config: RunnerConfig) -> Self {
        let store = MemoryStore::new();
        let clock = Arc::new(FixedClock::new(TemporalFixtures::now()));
        let sink = Arc::new(RecordingSink::new());
        let pricing = Arc::new(StaticPricing::new());

        let callbacks = Arc::new(CallbackService::new(
            Arc::new(store.clone()),
            sink.clone(),
            Arc::new(store.clone()),
            clock.clone(),
            callback_config,
        ));
        let ledger = Arc::new(LedgerService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            callbacks.clone(),
            clock.clone(),
        ));
        let campaigns = Arc::new(CampaignService::new(Arc::new(store.clone()), clock.clone()));
        let runner = Arc::new(JobRunner::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            ledger.clone(),
            pricing.clone(),
            clock.clone(),
            runner_config,
        ));

        Self {
            store,
            clock,
            sink,
            pricing,
            callbacks,
            ledger,
            campaigns,
            runner,
        }
    }

    /// Creates a regie with default configuration
    pub async fn create_regie(&self, label: &str, slug: &str) -> Regie {
        self.store
            .insert_regie(RegieBuilder::new().with_label(label, slug).build())
            .await
            .expect("failed to create regie")
    }

    /// Creates a finalized standalone invoice with one line per amount
    pub async fn create_invoice(
        &self,
        regie: &Regie,
        payer_external_id: &str,
        line_amounts: &[Amount],
    ) -> Invoice {
        self.create_invoice_with_urls(regie, payer_external_id, line_amounts, None, None)
            .await
    }

    /// Creates a finalized standalone invoice carrying callback URLs
    pub async fn create_invoice_with_urls(
        &self,
        regie: &Regie,
        payer_external_id: &str,
        line_amounts: &[Amount],
        payment_callback_url: Option<&str>,
        cancel_callback_url: Option<&str>,
    ) -> Invoice {
        let store: &dyn LedgerStore = &self.store;
        let draft = store
            .insert_draft_invoice(
                NewDraftInvoice {
                    regie_id: regie.id,
                    pool_id: None,
                    label: "Invoice".to_string(),
                    payer: PayerSnapshot::with_name(payer_external_id, "Jean", "Dupont"),
                    dates: InvoiceDates::new(
                        TemporalFixtures::publication(),
                        TemporalFixtures::payment_deadline(),
                        TemporalFixtures::due(),
                    ),
                    origin: Origin::Api,
                    previous_invoice_id: None,
                    payment_callback_url: payment_callback_url.map(str::to_string),
                    cancel_callback_url: cancel_callback_url.map(str::to_string),
                },
                self.clock.now(),
            )
            .await
            .expect("failed to create draft invoice");

        for (index, amount) in line_amounts.iter().enumerate() {
            store
                .insert_draft_invoice_line(
                    draft.id,
                    NewLine {
                        pool_id: None,
                        event_date: TemporalFixtures::period_start(),
                        label: format!("Line {}", index + 1),
                        quantity: rust_decimal::Decimal::ONE,
                        unit_amount: *amount,
                        description: String::new(),
                        event_slug: format!("event-{}", index + 1),
                        event_label: format!("Line {}", index + 1),
                        agenda_slug: String::new(),
                        activity_label: String::new(),
                        accounting_code: String::new(),
                        details: serde_json::Value::Object(Default::default()),
                        user: UserSnapshot::with_name(
                            format!("user:{payer_external_id}"),
                            "Jean",
                            "Dupont",
                        ),
                    },
                    self.clock.now(),
                )
                .await
                .expect("failed to create draft line");
        }

        match self
            .ledger
            .finalize_draft_invoice(draft.id, None)
            .await
            .expect("failed to finalize draft invoice")
        {
            FinalizedDocument::Invoice { invoice, .. } => invoice,
            FinalizedDocument::Credit { .. } => panic!("expected an invoice, got a credit"),
        }
    }

    /// Creates a finalized credit with one line per (positive) amount
    pub async fn create_credit(
        &self,
        regie: &Regie,
        payer_external_id: &str,
        line_amounts: &[Amount],
    ) -> domain_ledger::Credit {
        let store: &dyn LedgerStore = &self.store;
        let draft = store
            .insert_draft_invoice(
                NewDraftInvoice {
                    regie_id: regie.id,
                    pool_id: None,
                    label: "Credit".to_string(),
                    payer: PayerSnapshot::with_name(payer_external_id, "Jean", "Dupont"),
                    dates: InvoiceDates::new(
                        TemporalFixtures::publication(),
                        TemporalFixtures::payment_deadline(),
                        TemporalFixtures::due(),
                    ),
                    origin: Origin::Api,
                    previous_invoice_id: None,
                    payment_callback_url: None,
                    cancel_callback_url: None,
                },
                self.clock.now(),
            )
            .await
            .expect("failed to create draft credit");

        for (index, amount) in line_amounts.iter().enumerate() {
            store
                .insert_draft_invoice_line(
                    draft.id,
                    NewLine {
                        pool_id: None,
                        event_date: TemporalFixtures::period_start(),
                        label: format!("Credit line {}", index + 1),
                        quantity: rust_decimal::Decimal::ONE,
                        unit_amount: -*amount,
                        description: String::new(),
                        event_slug: format!("credit-event-{}", index + 1),
                        event_label: format!("Credit line {}", index + 1),
                        agenda_slug: String::new(),
                        activity_label: String::new(),
                        accounting_code: String::new(),
                        details: serde_json::Value::Object(Default::default()),
                        user: UserSnapshot::with_name(
                            format!("user:{payer_external_id}"),
                            "Jean",
                            "Dupont",
                        ),
                    },
                    self.clock.now(),
                )
                .await
                .expect("failed to create draft credit line");
        }

        match self
            .ledger
            .finalize_draft_invoice(draft.id, None)
            .await
            .expect("failed to finalize draft credit")
        {
            FinalizedDocument::Credit { credit, .. } => credit,
            FinalizedDocument::Invoice { .. } => panic!("expected a credit, got an invoice"),
        }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
