//! End-to-end pipeline test
//!
//! Drives a full billing cycle through the assembled services: campaign
//! preview, promotion, validation, payment with callback notification, and
//! cancellation, verifying the ledger invariants at each step.

use core_kernel::Amount;
use domain_callback::CallbackStatus;
use domain_campaign::{CampaignStore, PoolStatus};
use domain_ledger::{
    JournalLineData, LedgerStore, PayerSnapshot, PaymentRequest, UserSnapshot,
};
use domain_regie::RegieStore;
use test_utils::{AmountFixtures, CampaignBuilder, TemporalFixtures, TestEnv};

fn euros(e: i64) -> Amount {
    AmountFixtures::euros(e)
}

#[tokio::test]
async fn test_full_billing_cycle() {
    let env = TestEnv::new();
    let regie = env.create_regie("Cantine", "cantine").await;
    let campaign = env
        .campaigns
        .create_campaign(CampaignBuilder::new(regie.id).build())
        .await
        .unwrap();

    // two priced events for one payer over the period
    let user = UserSnapshot::with_name("user:1", "Ada", "Lovelace");
    let payer = PayerSnapshot::with_name("payer:1", "Ada", "Lovelace");
    env.pricing.set_users(vec![user.clone()]);
    env.pricing.set_lines(
        "user:1",
        vec![
            JournalLineData::success(
                TemporalFixtures::period_start(),
                "cantine@repas",
                "Repas",
                euros(30),
                user.clone(),
                payer.clone(),
            ),
            JournalLineData::success(
                TemporalFixtures::period_start(),
                "garderie@soir",
                "Garderie",
                euros(12),
                user,
                payer,
            ),
        ],
    );

    // preview
    let (draft_pool, _job) = env.campaigns.generate(campaign.id).await.unwrap();
    env.runner.run_pending_jobs().await.unwrap();
    let draft_pool = env.store.pool(draft_pool.id).await.unwrap();
    assert_eq!(draft_pool.status, PoolStatus::Completed);

    // accept the preview
    let (final_pool, _job) = env.campaigns.promote_pool(draft_pool.id).await.unwrap();
    env.runner.run_pending_jobs().await.unwrap();
    let final_pool = env.store.pool(final_pool.id).await.unwrap();
    assert_eq!(final_pool.status, PoolStatus::Completed);

    let invoices = env.store.invoices_for_pool(final_pool.id).await.unwrap();
    assert_eq!(invoices.len(), 1);
    let invoice = invoices[0].clone();
    assert_eq!(invoice.total_amount, euros(42));
    assert_eq!(invoice.remaining_amount, euros(42));
    assert_eq!(invoice.number, 1);

    // validate the campaign
    env.campaigns.mark_as_finalized(campaign.id).await.unwrap();
    env.runner.run_pending_jobs().await.unwrap();

    // settle the invoice at the counter
    let payment_type = env
        .store
        .payment_type_get_or_create(regie.id, "check", "Check")
        .await
        .unwrap();
    let payment = env
        .ledger
        .make_payment(PaymentRequest::new(
            regie.id,
            euros(42),
            payment_type.id,
            vec![invoice.id],
        ))
        .await
        .unwrap();
    assert!(payment.formatted_number.starts_with('R'));

    let invoice = env.store.invoice(invoice.id).await.unwrap();
    assert!(invoice.is_paid());

    // the payment callback was recorded for the paid invoice
    let store: &dyn domain_callback::CallbackStore = &env.store;
    let pending = store.pending_callbacks().await.unwrap();
    assert!(pending.is_empty());

    // cancel the payment: every line reopens
    let reason = env
        .store
        .insert_payment_cancellation_reason("Bounced check".to_string(), "bounced".to_string())
        .await
        .unwrap();
    env.ledger
        .cancel_payment(payment.id, reason.id, Some("agent".to_string()), String::new())
        .await
        .unwrap();

    let invoice = env.store.invoice(invoice.id).await.unwrap();
    assert_eq!(invoice.paid_amount, Amount::zero());
    assert_eq!(invoice.remaining_amount, euros(42));
    for line in env.store.lines_for_invoice(invoice.id).await.unwrap() {
        assert_eq!(line.paid_amount, Amount::zero());
        assert_eq!(line.remaining_amount, line.total_amount);
    }
}

#[tokio::test]
async fn test_callbacks_fire_on_invoice_payment() {
    let env = TestEnv::new();
    let regie = env.create_regie("Cantine", "cantine").await;
    let invoice = env
        .create_invoice_with_urls(
            &regie,
            "payer:1",
            &[euros(10)],
            Some("http://billing-aware.example/paid"),
            Some("http://billing-aware.example/cancelled"),
        )
        .await;

    let payment_type = env
        .store
        .payment_type_get_or_create(regie.id, "online", "Online")
        .await
        .unwrap();
    let payment = env
        .ledger
        .make_payment(PaymentRequest::new(
            regie.id,
            euros(10),
            payment_type.id,
            vec![invoice.id],
        ))
        .await
        .unwrap();

    let deliveries = env.sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].url, "http://billing-aware.example/paid");
    assert_eq!(deliveries[0].notification_type, "payment");
    assert_eq!(
        deliveries[0].payload["payment_id"],
        payment.uuid.to_string()
    );

    // cancelling notifies the cancel URL, after the payment callback
    let reason = env
        .store
        .insert_payment_cancellation_reason("Error".to_string(), "error".to_string())
        .await
        .unwrap();
    env.ledger
        .cancel_payment(payment.id, reason.id, None, String::new())
        .await
        .unwrap();

    let deliveries = env.sink.deliveries();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[1].url, "http://billing-aware.example/cancelled");

    let store: &dyn domain_callback::CallbackStore = &env.store;
    assert!(store.pending_callbacks().await.unwrap().is_empty());
    let first = store.callback(core_kernel::CallbackId::new(1)).await.unwrap();
    assert_eq!(first.status, CallbackStatus::Completed);
}

#[tokio::test]
async fn test_partial_payment_keeps_invoice_open() {
    let env = TestEnv::new();
    let regie = env.create_regie("Cantine", "cantine").await;
    let invoice = env
        .create_invoice_with_urls(
            &regie,
            "payer:1",
            &[euros(10), euros(20)],
            Some("http://billing-aware.example/paid"),
            None,
        )
        .await;

    let payment_type = env
        .store
        .payment_type_get_or_create(regie.id, "cash", "Cash")
        .await
        .unwrap();
    env.ledger
        .make_payment(PaymentRequest::new(
            regie.id,
            euros(10),
            payment_type.id,
            vec![invoice.id],
        ))
        .await
        .unwrap();

    // not fully paid: no payment notification yet
    assert_eq!(env.sink.delivery_count(), 0);

    env.ledger
        .make_payment(PaymentRequest::new(
            regie.id,
            euros(20),
            payment_type.id,
            vec![invoice.id],
        ))
        .await
        .unwrap();
    assert_eq!(env.sink.delivery_count(), 1);
}
