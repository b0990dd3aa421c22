//! Callback delivery tests: ordering, retries, terminal states and cleanup

use std::time::Duration as StdDuration;

use chrono::Duration;
use domain_callback::{
    CallbackConfig, CallbackService, CallbackStatus, CallbackStore, NotifyOutcome, TargetRef,
};
use domain_campaign::RunnerConfig;
use test_utils::{AmountFixtures, TestEnv};

fn small_retry_env() -> TestEnv {
    TestEnv::with_configs(
        CallbackConfig {
            max_retries: 3,
            ..CallbackConfig::default()
        },
        RunnerConfig::default(),
    )
}

async fn invoice_target(env: &TestEnv) -> TargetRef {
    let regie = env.create_regie("Foo", "foo").await;
    let invoice = env
        .create_invoice_with_urls(
            &regie,
            "payer:1",
            &[AmountFixtures::euros(10)],
            Some("http://invoice-payment.example"),
            Some("http://invoice-cancel.example"),
        )
        .await;
    TargetRef::invoice(invoice.id.value())
}

#[tokio::test]
async fn test_notify_delivers_immediately() {
    let env = TestEnv::new();
    let target = invoice_target(&env).await;

    let callback = env
        .callbacks
        .notify(target, "payment", serde_json::json!({"foo": "bar"}))
        .await
        .unwrap();

    assert_eq!(callback.status, CallbackStatus::Completed);
    assert_eq!(callback.retries_counter, 0);
    assert_eq!(callback.retry_reason, "");

    let deliveries = env.sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].url, "http://invoice-payment.example");
    assert_eq!(deliveries[0].notification_type, "payment");
    assert_eq!(deliveries[0].payload, serde_json::json!({"foo": "bar"}));
    // first attempt uses the short timeout tier
    assert_eq!(deliveries[0].timeout.connect, StdDuration::from_secs(15));
    assert_eq!(deliveries[0].timeout.read, None);
}

#[tokio::test]
async fn test_notify_without_configured_url_completes_silently() {
    let env = TestEnv::new();
    let regie = env.create_regie("Foo", "foo").await;
    let invoice = env
        .create_invoice(&regie, "payer:1", &[AmountFixtures::euros(10)])
        .await;

    let callback = env
        .callbacks
        .notify(
            TargetRef::invoice(invoice.id.value()),
            "payment",
            serde_json::json!({}),
        )
        .await
        .unwrap();

    assert_eq!(callback.status, CallbackStatus::Completed);
    assert_eq!(env.sink.delivery_count(), 0);
}

#[tokio::test]
async fn test_delivery_is_ordered_per_target() {
    let env = TestEnv::new();
    let target = invoice_target(&env).await;

    // first callback fails, leaving it pending
    env.sink.fail_next(1, "connection refused");
    let first = env
        .callbacks
        .notify(target, "payment", serde_json::json!({"seq": 1}))
        .await
        .unwrap();
    assert_eq!(first.status, CallbackStatus::ToRetry);

    // the second callback must not run past the pending first one
    env.sink.succeed();
    let second = env
        .callbacks
        .notify(target, "payment", serde_json::json!({"seq": 2}))
        .await
        .unwrap();
    assert_eq!(second.status, CallbackStatus::Registered);
    assert_eq!(env.sink.delivery_count(), 1);

    let outcome = env.callbacks.do_notify(second.id).await.unwrap();
    assert_eq!(outcome, NotifyOutcome::Blocked);

    // the sweep drains the chain in creation order
    env.callbacks.retry_pending().await.unwrap();
    let store: &dyn CallbackStore = &env.store;
    let first = store.callback(first.id).await.unwrap();
    let second = store.callback(second.id).await.unwrap();
    assert_eq!(first.status, CallbackStatus::Completed);
    assert_eq!(second.status, CallbackStatus::Completed);

    let payloads: Vec<_> = env
        .sink
        .deliveries()
        .into_iter()
        .map(|d| d.payload["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(payloads, vec![1, 1, 2]);
}

#[tokio::test]
async fn test_callbacks_for_distinct_targets_are_independent() {
    let env = TestEnv::new();
    let target = invoice_target(&env).await;
    let regie = domain_regie::RegieStore::regie_by_slug(&env.store, "foo")
        .await
        .unwrap();
    let other_invoice = env
        .create_invoice_with_urls(
            &regie,
            "payer:2",
            &[AmountFixtures::euros(5)],
            Some("http://other-payment.example"),
            None,
        )
        .await;

    env.sink.fail_next(1, "connection refused");
    env.callbacks
        .notify(target, "payment", serde_json::json!({}))
        .await
        .unwrap();

    env.sink.succeed();
    let other = env
        .callbacks
        .notify(
            TargetRef::invoice(other_invoice.id.value()),
            "payment",
            serde_json::json!({}),
        )
        .await
        .unwrap();
    assert_eq!(other.status, CallbackStatus::Completed);
}

#[tokio::test]
async fn test_retry_reason_and_timeout_tiers() {
    let env = small_retry_env();
    let target = invoice_target(&env).await;

    env.sink.fail_always("HTTP 500");
    let callback = env
        .callbacks
        .notify(target, "payment", serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(callback.status, CallbackStatus::ToRetry);
    assert_eq!(callback.retries_counter, 1);
    assert_eq!(callback.retry_reason, "HTTP 500");

    env.callbacks.retry_pending().await.unwrap();
    let deliveries = env.sink.deliveries();
    assert_eq!(deliveries.len(), 2);
    // retries use the long read timeout
    assert_eq!(deliveries[1].timeout.connect, StdDuration::from_secs(15));
    assert_eq!(deliveries[1].timeout.read, Some(StdDuration::from_secs(60)));
}

#[tokio::test]
async fn test_failing_callback_reaches_failed_after_budget() {
    let env = small_retry_env();
    let target = invoice_target(&env).await;

    env.sink.fail_always("HTTP 500");
    let callback = env
        .callbacks
        .notify(target, "payment", serde_json::json!({}))
        .await
        .unwrap();

    let store: &dyn CallbackStore = &env.store;
    // three more sweeps: retries 2, 3 then the terminal failure at 4
    for expected in [2u32, 3] {
        env.callbacks.retry_pending().await.unwrap();
        let current = store.callback(callback.id).await.unwrap();
        assert_eq!(current.status, CallbackStatus::ToRetry);
        assert_eq!(current.retries_counter, expected);
    }
    env.callbacks.retry_pending().await.unwrap();
    let current = store.callback(callback.id).await.unwrap();
    assert_eq!(current.status, CallbackStatus::Failed);
    assert_eq!(current.retries_counter, 4);

    // failed is terminal: further sweeps never touch it
    env.callbacks.retry_pending().await.unwrap();
    let current = store.callback(callback.id).await.unwrap();
    assert_eq!(current.status, CallbackStatus::Failed);
    assert_eq!(current.retries_counter, 4);
    assert_eq!(env.sink.delivery_count(), 4);
}

#[tokio::test]
async fn test_purge_removes_old_terminal_callbacks_only() {
    let env = TestEnv::new();
    let target = invoice_target(&env).await;

    let completed = env
        .callbacks
        .notify(target, "payment", serde_json::json!({}))
        .await
        .unwrap();
    env.sink.fail_always("HTTP 500");
    let pending = env
        .callbacks
        .notify(target, "cancel", serde_json::json!({}))
        .await
        .unwrap();

    // everything is too recent to purge
    assert_eq!(env.callbacks.purge().await.unwrap(), 0);

    env.clock.advance(Duration::days(51));
    let purged = env.callbacks.purge().await.unwrap();
    assert_eq!(purged, 1);

    let store: &dyn CallbackStore = &env.store;
    assert!(store.callback(completed.id).await.is_err());
    assert!(store.callback(pending.id).await.is_ok());
}
