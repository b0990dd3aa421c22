//! Campaign pipeline tests: draft generation, promotion, readiness gating,
//! claim exclusivity and retention policies

use chrono::Duration;

use core_kernel::Amount;
use domain_campaign::{
    CampaignStore, InjectedLinesMode, JobStatus, PoolStatus, PoolPromotionError, CampaignError,
};
use domain_ledger::{
    JournalLineData, LedgerStore, LineStatus, PayerSnapshot, UserSnapshot,
};
use test_utils::{AmountFixtures, CampaignBuilder, TemporalFixtures, TestEnv};

fn euros(e: i64) -> Amount {
    AmountFixtures::euros(e)
}

fn user(id: &str) -> UserSnapshot {
    UserSnapshot::with_name(format!("user:{id}"), "Jean", id)
}

fn payer(id: &str) -> PayerSnapshot {
    PayerSnapshot::with_name(format!("payer:{id}"), "Jean", id)
}

fn success_line(slug: &str, amount: Amount, user_id: &str, payer_id: &str) -> JournalLineData {
    JournalLineData::success(
        TemporalFixtures::period_start(),
        slug,
        slug.to_string(),
        amount,
        user(user_id),
        payer(payer_id),
    )
}

/// Sets up a regie, a campaign and scripted pricing output
async fn campaign_env() -> (TestEnv, domain_regie::Regie, domain_campaign::Campaign) {
    let env = TestEnv::new();
    let regie = env.create_regie("Foo", "foo").await;
    let campaign = env
        .campaigns
        .create_campaign(CampaignBuilder::new(regie.id).build())
        .await
        .unwrap();
    (env, regie, campaign)
}

mod draft_generation {
    use super::*;

    #[tokio::test]
    async fn test_draft_run_produces_per_payer_invoices() {
        let (env, _regie, campaign) = campaign_env().await;
        env.pricing.set_users(vec![user("1"), user("2")]);
        env.pricing.set_lines(
            "user:1",
            vec![
                success_line("cantine@repas", euros(10), "1", "1"),
                success_line("garderie@soir", euros(5), "1", "1"),
            ],
        );
        env.pricing.set_lines(
            "user:2",
            vec![
                success_line("cantine@repas", euros(7), "2", "2"),
                JournalLineData::error(
                    TemporalFixtures::period_start(),
                    "garderie@soir",
                    user("2"),
                    payer("2"),
                    "PricingNotFound",
                ),
            ],
        );

        let (pool, _job) = env.campaigns.generate(campaign.id).await.unwrap();
        let executed = env.runner.run_pending_jobs().await.unwrap();
        assert!(executed >= 3);

        let pool = env.store.pool(pool.id).await.unwrap();
        assert_eq!(pool.status, PoolStatus::Completed);
        assert!(pool.completed_at.is_some());

        let drafts = env.store.draft_invoices_for_pool(pool.id).await.unwrap();
        assert_eq!(drafts.len(), 2);
        let first = &drafts[0];
        let second = &drafts[1];
        assert_eq!(first.payer.external_id, "payer:1");
        assert_eq!(first.total_amount, euros(15));
        assert!(first.formatted_number().starts_with("TEMPORARY-"));
        assert_eq!(second.payer.external_id, "payer:2");
        assert_eq!(second.total_amount, euros(7));

        // the error line is kept on the pool but not billed
        let journal_lines = env.store.journal_lines_for_pool(pool.id).await.unwrap();
        assert_eq!(journal_lines.len(), 4);
        let error_lines: Vec<_> = journal_lines
            .iter()
            .filter(|l| l.data.status == LineStatus::Error)
            .collect();
        assert_eq!(error_lines.len(), 1);
        assert!(error_lines[0].draft_invoice_line_id.is_none());
        assert_eq!(error_lines[0].error_reason(), Some("PricingNotFound"));
    }

    #[tokio::test]
    async fn test_error_lines_can_be_triaged() {
        let (env, _regie, campaign) = campaign_env().await;
        env.pricing.set_users(vec![user("1")]);
        env.pricing.set_lines(
            "user:1",
            vec![JournalLineData::error(
                TemporalFixtures::period_start(),
                "cantine@repas",
                user("1"),
                payer("1"),
                "PricingNotFound",
            )],
        );
        let (pool, _job) = env.campaigns.generate(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();

        let lines = env.store.journal_lines_for_pool(pool.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        let triaged = env
            .ledger
            .set_journal_line_error_status(
                lines[0].id,
                Some(domain_ledger::ErrorStatus::Ignored),
            )
            .await
            .unwrap();
        assert_eq!(triaged.error_status, Some(domain_ledger::ErrorStatus::Ignored));

        // success lines cannot be triaged
        env.pricing.set_lines(
            "user:1",
            vec![success_line("cantine@repas", euros(10), "1", "1")],
        );
        let (pool, _job) = env.campaigns.generate(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();
        let lines = env.store.journal_lines_for_pool(pool.id).await.unwrap();
        let result = env
            .ledger
            .set_journal_line_error_status(lines[0].id, Some(domain_ledger::ErrorStatus::Fixed))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_pricing_failure_fails_the_pool() {
        let (env, _regie, campaign) = campaign_env().await;
        env.pricing.set_users(vec![user("1")]);
        env.pricing.fail_with("agenda backend unreachable");

        let (pool, job) = env.campaigns.generate(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();

        let pool = env.store.pool(pool.id).await.unwrap();
        assert_eq!(pool.status, PoolStatus::Failed);
        assert!(pool.exception.contains("agenda backend unreachable"));

        let job = env.store.campaign_job(job.uuid).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);

        assert!(env
            .store
            .draft_invoices_for_pool(pool.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_injected_lines_follow_campaign_mode() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let campaign = env
            .campaigns
            .create_campaign(
                CampaignBuilder::new(regie.id)
                    .with_injected_lines(InjectedLinesMode::Period)
                    .build(),
            )
            .await
            .unwrap();

        // one injected line inside the period, one before it
        env.ledger
            .create_injected_line(
                regie.id,
                TemporalFixtures::period_start() + Duration::days(3),
                "surcharge",
                "Surcharge",
                euros(4),
                "user:1",
                payer("1"),
            )
            .await
            .unwrap();
        env.ledger
            .create_injected_line(
                regie.id,
                TemporalFixtures::period_start() - Duration::days(10),
                "old-surcharge",
                "Old surcharge",
                euros(9),
                "user:1",
                payer("1"),
            )
            .await
            .unwrap();

        env.pricing.set_users(vec![user("1")]);
        env.pricing
            .set_lines("user:1", vec![success_line("cantine@repas", euros(10), "1", "1")]);

        let (pool, _job) = env.campaigns.generate(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();

        let drafts = env.store.draft_invoices_for_pool(pool.id).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].total_amount, euros(14));
    }
}

mod promotion {
    use super::*;

    async fn completed_draft_pool(
        env: &TestEnv,
        campaign: &domain_campaign::Campaign,
    ) -> domain_campaign::Pool {
        env.pricing.set_users(vec![user("1"), user("2")]);
        env.pricing
            .set_lines("user:1", vec![success_line("cantine@repas", euros(10), "1", "1")]);
        // payer 2 ends up negative and promotes into a credit
        env.pricing
            .set_lines("user:2", vec![success_line("absence@repas", -euros(6), "2", "2")]);
        let (pool, _job) = env.campaigns.generate(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();
        env.store.pool(pool.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_promotion_finalizes_invoices_and_credits() {
        let (env, _regie, campaign) = campaign_env().await;
        let draft_pool = completed_draft_pool(&env, &campaign).await;

        let (final_pool, _job) = env.campaigns.promote_pool(draft_pool.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();

        let final_pool = env.store.pool(final_pool.id).await.unwrap();
        assert_eq!(final_pool.status, PoolStatus::Completed);
        assert!(!final_pool.draft);

        let invoices = env.store.invoices_for_pool(final_pool.id).await.unwrap();
        assert_eq!(invoices.len(), 1);
        let invoice = &invoices[0];
        assert_eq!(invoice.payer.external_id, "payer:1");
        assert_eq!(invoice.total_amount, euros(10));
        assert_eq!(invoice.paid_amount, Amount::zero());
        assert_eq!(invoice.remaining_amount, euros(10));
        // counter numbers are allocated at promotion, never earlier
        assert_eq!(invoice.formatted_number, "F01-22-09-0000001");

        let credits = env.store.credits_for_pool(final_pool.id).await.unwrap();
        assert_eq!(credits.len(), 1);
        let credit = &credits[0];
        assert_eq!(credit.payer.external_id, "payer:2");
        // credit totals are positive, quantities inverted
        assert_eq!(credit.total_amount, euros(6));
        assert_eq!(credit.remaining_amount, euros(6));
        assert!(credit.formatted_number.starts_with('A'));

        // copied journal lines point at the final document lines
        let journal_lines = env
            .store
            .journal_lines_for_pool(final_pool.id)
            .await
            .unwrap();
        assert_eq!(journal_lines.len(), 2);
        assert!(journal_lines
            .iter()
            .any(|l| l.invoice_line_id.is_some() && l.credit_line_id.is_none()));
        assert!(journal_lines
            .iter()
            .any(|l| l.credit_line_id.is_some() && l.invoice_line_id.is_none()));
    }

    #[tokio::test]
    async fn test_only_the_last_completed_draft_pool_promotes() {
        let (env, _regie, campaign) = campaign_env().await;
        let first_pool = completed_draft_pool(&env, &campaign).await;

        // a fresh preview supersedes the first pool
        let (_second_pool, _job) = env.campaigns.generate(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();

        let result = env.campaigns.promote_pool(first_pool.id).await;
        assert!(matches!(
            result,
            Err(CampaignError::Promotion(PoolPromotionError::NotLast))
        ));
    }

    #[tokio::test]
    async fn test_registered_pool_does_not_promote() {
        let (env, _regie, campaign) = campaign_env().await;
        let (pool, _job) = env.campaigns.generate(campaign.id).await.unwrap();
        // no runner tick: the pool is still registered
        let result = env.campaigns.promote_pool(pool.id).await;
        assert!(matches!(
            result,
            Err(CampaignError::Promotion(PoolPromotionError::NotCompleted))
        ));
    }
}

mod campaign_validation {
    use super::*;

    #[tokio::test]
    async fn test_finalization_assigns_campaign_credits_to_invoices() {
        let (env, regie, campaign) = campaign_env().await;

        // an older standalone invoice for the credited payer
        let standalone = env.create_invoice(&regie, "payer:2", &[euros(4)]).await;

        env.pricing.set_users(vec![user("2")]);
        env.pricing
            .set_lines("user:2", vec![success_line("absence@repas", -euros(6), "2", "2")]);
        let (draft_pool, _job) = env.campaigns.generate(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();
        env.campaigns.promote_pool(draft_pool.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();

        env.campaigns.mark_as_finalized(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();

        let standalone = env.store.invoice(standalone.id).await.unwrap();
        assert!(standalone.is_paid());

        let campaign = env.store.campaign(campaign.id).await.unwrap();
        assert!(campaign.finalized);
        assert!(campaign.finalized_at.is_some());

        // 6 of credit minus the 4 assigned remain available
        let pools = env.store.pools_for_campaign(campaign.id).await.unwrap();
        let final_pool = pools.iter().find(|p| !p.draft).unwrap();
        let credits = env.store.credits_for_pool(final_pool.id).await.unwrap();
        assert_eq!(credits[0].remaining_amount, euros(2));
    }

    #[tokio::test]
    async fn test_unfinalized_campaign_credits_are_not_assignable() {
        let (env, regie, campaign) = campaign_env().await;
        env.pricing.set_users(vec![user("2")]);
        env.pricing
            .set_lines("user:2", vec![success_line("absence@repas", -euros(6), "2", "2")]);
        let (draft_pool, _job) = env.campaigns.generate(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();
        env.campaigns.promote_pool(draft_pool.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();

        // campaign not finalized: its credits must not pay new invoices
        let invoice = env.create_invoice(&regie, "payer:2", &[euros(4)]).await;
        let assigned = env
            .ledger
            .assign_credits_for_invoice(invoice.id)
            .await
            .unwrap();
        assert_eq!(assigned, 0);
    }
}

mod scheduling {
    use super::*;
    use core_kernel::Clock;
    use std::sync::Arc;

    /// Two concurrent claims on the same registered job: exactly one wins
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_job_claim_is_exclusive() {
        let (env, _regie, campaign) = campaign_env().await;
        let (_pool, job) = env.campaigns.generate(campaign.id).await.unwrap();

        let store = Arc::new(env.store.clone());
        let now = env.clock.now();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let uuid = job.uuid;
            handles.push(tokio::spawn(async move {
                CampaignStore::claim_job(&*store, uuid, now).await.unwrap()
            }));
        }
        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_claim_is_exclusive() {
        let (env, _regie, campaign) = campaign_env().await;
        let (pool, _job) = env.campaigns.generate(campaign.id).await.unwrap();

        let store = Arc::new(env.store.clone());
        let now = env.clock.now();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let pool_id = pool.id;
            handles.push(tokio::spawn(async move {
                CampaignStore::claim_pool(&*store, pool_id, PoolStatus::Registered, now)
                    .await
                    .unwrap()
            }));
        }
        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_running_cap_blocks_the_tick() {
        let (env, _regie, campaign) = campaign_env().await;
        let (_pool, job) = env.campaigns.generate(campaign.id).await.unwrap();

        // saturate the cap by claiming the only job
        CampaignStore::claim_job(&env.store, job.uuid, env.clock.now())
            .await
            .unwrap();
        let executed = env.runner.run_next_job().await.unwrap();
        assert!(executed.is_none());
    }

    #[tokio::test]
    async fn test_corrective_campaign_waits_for_primary_jobs() {
        let (env, regie, primary) = campaign_env().await;
        env.pricing.set_users(vec![user("1")]);
        env.pricing.fail_with("agenda backend unreachable");

        let (_pool, primary_job) = env.campaigns.generate(primary.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();
        let primary_job = env.store.campaign_job(primary_job.uuid).await.unwrap();
        assert_eq!(primary_job.status, JobStatus::Failed);

        let corrective = env
            .campaigns
            .create_campaign(
                CampaignBuilder::new(regie.id)
                    .with_label("September fix")
                    .correcting(primary.id)
                    .build(),
            )
            .await
            .unwrap();
        let (_pool, corrective_job) = env.campaigns.generate(corrective.id).await.unwrap();

        // the primary's job never completed, so the corrective job stays put
        env.runner.run_pending_jobs().await.unwrap();
        let corrective_job = env.store.campaign_job(corrective_job.uuid).await.unwrap();
        assert_eq!(corrective_job.status, JobStatus::Registered);
    }

    #[tokio::test]
    async fn test_corrective_campaigns_track_the_latest() {
        let (env, regie, primary) = campaign_env().await;
        assert!(env.campaigns.is_last(&primary).await.unwrap());

        let corrective = env
            .campaigns
            .create_campaign(
                CampaignBuilder::new(regie.id).correcting(primary.id).build(),
            )
            .await
            .unwrap();
        let primary = env.store.campaign(primary.id).await.unwrap();
        assert!(!env.campaigns.is_last(&primary).await.unwrap());
        assert!(env.campaigns.is_last(&corrective).await.unwrap());

        env.campaigns.mark_as_invalid(primary.id).await.unwrap();
        let primary = env.store.campaign(primary.id).await.unwrap();
        assert!(primary.invalid);
        env.campaigns.mark_as_valid(primary.id).await.unwrap();
        let primary = env.store.campaign(primary.id).await.unwrap();
        assert!(!primary.invalid);
    }

    #[tokio::test]
    async fn test_corrective_hierarchy_is_single_level() {
        let (env, regie, primary) = campaign_env().await;
        let corrective = env
            .campaigns
            .create_campaign(
                CampaignBuilder::new(regie.id).correcting(primary.id).build(),
            )
            .await
            .unwrap();
        let result = env
            .campaigns
            .create_campaign(
                CampaignBuilder::new(regie.id)
                    .correcting(corrective.id)
                    .build(),
            )
            .await;
        assert!(matches!(result, Err(CampaignError::InvalidOperation(_))));
    }
}

mod retention {
    use super::*;

    #[tokio::test]
    async fn test_job_gc_windows() {
        let (env, _regie, campaign) = campaign_env().await;
        env.pricing.set_users(vec![user("1")]);
        env.pricing
            .set_lines("user:1", vec![success_line("cantine@repas", euros(10), "1", "1")]);
        env.campaigns.generate(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();

        // completed jobs survive two days, not three
        env.clock.advance(Duration::days(1));
        assert_eq!(env.runner.gc_jobs().await.unwrap(), 0);
        env.clock.advance(Duration::days(2));
        assert!(env.runner.gc_jobs().await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_failed_jobs_kept_ten_days() {
        let (env, _regie, campaign) = campaign_env().await;
        env.pricing.set_users(vec![user("1")]);
        env.pricing.fail_with("agenda backend unreachable");
        let (_pool, job) = env.campaigns.generate(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();

        env.clock.advance(Duration::days(9));
        env.runner.gc_jobs().await.unwrap();
        assert!(env.store.campaign_job(job.uuid).await.is_ok());

        env.clock.advance(Duration::days(2));
        env.runner.gc_jobs().await.unwrap();
        assert!(env.store.campaign_job(job.uuid).await.is_err());
    }

    #[tokio::test]
    async fn test_draft_pool_retention_keeps_newest() {
        let (env, _regie, campaign) = campaign_env().await;
        env.pricing.set_users(vec![user("1")]);
        env.pricing
            .set_lines("user:1", vec![success_line("cantine@repas", euros(10), "1", "1")]);

        // two previews, then finalize
        let (old_pool, _) = env.campaigns.generate(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();
        let (new_pool, _) = env.campaigns.generate(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();
        env.campaigns.mark_as_finalized(campaign.id).await.unwrap();
        env.runner.run_pending_jobs().await.unwrap();

        // too early: nothing is pruned
        env.clock.advance(Duration::days(30));
        assert_eq!(env.runner.clean_draft_pools().await.unwrap(), 0);

        env.clock.advance(Duration::days(2));
        assert_eq!(env.runner.clean_draft_pools().await.unwrap(), 1);
        assert!(env.store.pool(old_pool.id).await.is_err());
        assert!(env.store.pool(new_pool.id).await.is_ok());

        // the old pool's draft documents are gone with it
        assert!(env
            .store
            .journal_lines_for_pool(old_pool.id)
            .await
            .unwrap()
            .is_empty());
        assert!(env
            .store
            .draft_invoices_for_pool(old_pool.id)
            .await
            .unwrap()
            .is_empty());

        // a single remaining draft pool is never pruned
        assert_eq!(env.runner.clean_draft_pools().await.unwrap(), 0);
    }
}
