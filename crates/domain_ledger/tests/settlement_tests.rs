//! Settlement tests: payment allocation, reversal and credit assignment

use core_kernel::Amount;
use domain_ledger::{LedgerError, LedgerStore, PaymentRequest};
use domain_regie::RegieStore;
use test_utils::{AmountFixtures, TestEnv};

fn euros(e: i64) -> Amount {
    AmountFixtures::euros(e)
}

fn cents(c: i64) -> Amount {
    AmountFixtures::cents(c)
}

mod payment_allocation {
    use super::*;

    /// A 12.00 payment against lines [10.00, 5.00, 20.00] allocates
    /// [10.00, 2.00] in line order
    #[tokio::test]
    async fn test_allocation_consumes_lines_in_id_order() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let invoice = env
            .create_invoice(&regie, "payer:1", &[euros(10), euros(5), euros(20)])
            .await;
        assert_eq!(invoice.total_amount, euros(35));
        assert_eq!(invoice.remaining_amount, euros(35));

        let payment_type = env
            .store
            .payment_type_get_or_create(regie.id, "cash", "Cash")
            .await
            .unwrap();
        let payment = env
            .ledger
            .make_payment(PaymentRequest::new(
                regie.id,
                euros(12),
                payment_type.id,
                vec![invoice.id],
            ))
            .await
            .unwrap();

        let allocations = env
            .store
            .line_payments_for_payment(payment.id)
            .await
            .unwrap();
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].amount, euros(10));
        assert_eq!(allocations[1].amount, euros(2));

        let lines = env.store.lines_for_invoice(invoice.id).await.unwrap();
        assert_eq!(lines[0].paid_amount, euros(10));
        assert_eq!(lines[0].remaining_amount, Amount::zero());
        assert_eq!(lines[1].paid_amount, euros(2));
        assert_eq!(lines[1].remaining_amount, euros(3));
        assert_eq!(lines[2].paid_amount, Amount::zero());
        assert_eq!(lines[2].remaining_amount, euros(20));

        let invoice = env.store.invoice(invoice.id).await.unwrap();
        assert_eq!(invoice.paid_amount, euros(12));
        assert_eq!(invoice.remaining_amount, euros(23));
    }

    #[tokio::test]
    async fn test_settled_lines_are_skipped() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let invoice = env
            .create_invoice(&regie, "payer:1", &[euros(10), euros(5)])
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
        let second = env
            .ledger
            .make_payment(PaymentRequest::new(
                regie.id,
                euros(5),
                payment_type.id,
                vec![invoice.id],
            ))
            .await
            .unwrap();

        // the second payment lands entirely on the second line
        let allocations = env
            .store
            .line_payments_for_payment(second.id)
            .await
            .unwrap();
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].amount, euros(5));

        let invoice = env.store.invoice(invoice.id).await.unwrap();
        assert!(invoice.is_paid());
    }

    #[tokio::test]
    async fn test_payment_spans_invoices_in_id_order() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let first = env.create_invoice(&regie, "payer:1", &[euros(10)]).await;
        let second = env.create_invoice(&regie, "payer:1", &[euros(20)]).await;
        let payment_type = env
            .store
            .payment_type_get_or_create(regie.id, "check", "Check")
            .await
            .unwrap();

        env.ledger
            .make_payment(PaymentRequest::new(
                regie.id,
                euros(15),
                payment_type.id,
                vec![second.id, first.id],
            ))
            .await
            .unwrap();

        let first = env.store.invoice(first.id).await.unwrap();
        let second = env.store.invoice(second.id).await.unwrap();
        assert!(first.is_paid());
        assert_eq!(second.paid_amount, euros(5));
        assert_eq!(second.remaining_amount, euros(15));
    }

    #[tokio::test]
    async fn test_line_scope_restricts_allocation() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let invoice = env
            .create_invoice(&regie, "payer:1", &[euros(10), euros(5)])
            .await;
        let lines = env.store.lines_for_invoice(invoice.id).await.unwrap();
        let payment_type = env
            .store
            .payment_type_get_or_create(regie.id, "cash", "Cash")
            .await
            .unwrap();

        let mut request = PaymentRequest::new(regie.id, euros(5), payment_type.id, vec![invoice.id]);
        request.line_scope = Some(vec![lines[1].id]);
        env.ledger.make_payment(request).await.unwrap();

        let lines = env.store.lines_for_invoice(invoice.id).await.unwrap();
        assert_eq!(lines[0].paid_amount, Amount::zero());
        assert_eq!(lines[1].paid_amount, euros(5));
    }

    #[tokio::test]
    async fn test_non_positive_payment_is_rejected() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let invoice = env.create_invoice(&regie, "payer:1", &[euros(10)]).await;
        let payment_type = env
            .store
            .payment_type_get_or_create(regie.id, "cash", "Cash")
            .await
            .unwrap();

        let result = env
            .ledger
            .make_payment(PaymentRequest::new(
                regie.id,
                Amount::zero(),
                payment_type.id,
                vec![invoice.id],
            ))
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidOperation(_))));
    }
}

mod payment_cancellation {
    use super::*;

    #[tokio::test]
    async fn test_cancellation_restores_every_line() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let invoice = env
            .create_invoice(&regie, "payer:1", &[euros(10), euros(5), euros(20)])
            .await;
        let payment_type = env
            .store
            .payment_type_get_or_create(regie.id, "cash", "Cash")
            .await
            .unwrap();
        let payment = env
            .ledger
            .make_payment(PaymentRequest::new(
                regie.id,
                euros(12),
                payment_type.id,
                vec![invoice.id],
            ))
            .await
            .unwrap();

        let reason = env
            .store
            .insert_payment_cancellation_reason("Input error".to_string(), "input-error".to_string())
            .await
            .unwrap();
        let cancelled = env
            .ledger
            .cancel_payment(payment.id, reason.id, Some("agent".to_string()), String::new())
            .await
            .unwrap();
        assert!(cancelled.is_cancelled());

        let lines = env.store.lines_for_invoice(invoice.id).await.unwrap();
        for line in &lines {
            assert_eq!(line.paid_amount, Amount::zero());
            assert_eq!(line.remaining_amount, line.total_amount);
        }
        let invoice = env.store.invoice(invoice.id).await.unwrap();
        assert_eq!(invoice.paid_amount, Amount::zero());
        assert_eq!(invoice.remaining_amount, invoice.total_amount);

        let allocations = env
            .store
            .line_payments_for_payment(payment.id)
            .await
            .unwrap();
        assert!(allocations.is_empty());
    }

    #[tokio::test]
    async fn test_cancelling_twice_is_refused() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let invoice = env.create_invoice(&regie, "payer:1", &[euros(10)]).await;
        let payment_type = env
            .store
            .payment_type_get_or_create(regie.id, "cash", "Cash")
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

        let reason = env
            .store
            .insert_payment_cancellation_reason("Input error".to_string(), "input-error".to_string())
            .await
            .unwrap();
        env.ledger
            .cancel_payment(payment.id, reason.id, None, String::new())
            .await
            .unwrap();
        let result = env
            .ledger
            .cancel_payment(payment.id, reason.id, None, String::new())
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_cancellation_requires_known_reason() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let invoice = env.create_invoice(&regie, "payer:1", &[euros(10)]).await;
        let payment_type = env
            .store
            .payment_type_get_or_create(regie.id, "cash", "Cash")
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

        let result = env
            .ledger
            .cancel_payment(
                payment.id,
                core_kernel::PaymentCancellationReasonId::new(999),
                None,
                String::new(),
            )
            .await;
        assert!(result.is_err());
    }
}

mod credit_assignment {
    use super::*;

    /// A new credit is spent on the payer's outstanding invoices oldest
    /// first when the regie opts in, without any explicit call
    #[tokio::test]
    async fn test_auto_assignment_oldest_invoice_first() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let older = env.create_invoice(&regie, "payer:1", &[euros(10)]).await;
        let newer = env.create_invoice(&regie, "payer:1", &[euros(20)]).await;

        // assignment happens as part of credit creation
        let credit = env.create_credit(&regie, "payer:1", &[euros(15)]).await;
        assert_eq!(credit.total_amount, euros(15));
        assert_eq!(credit.remaining_amount, Amount::zero());

        // a spent credit has nothing left to assign
        let assigned = env
            .ledger
            .assign_credits_for_credit(credit.id, false)
            .await
            .unwrap();
        assert_eq!(assigned, 0);

        let older = env.store.invoice(older.id).await.unwrap();
        let newer = env.store.invoice(newer.id).await.unwrap();
        assert!(older.is_paid());
        assert_eq!(newer.paid_amount, euros(5));

        let credit = env.store.credit(credit.id).await.unwrap();
        assert_eq!(credit.assigned_amount, euros(15));
        assert_eq!(credit.remaining_amount, Amount::zero());

        let assignments = env.store.assignments_for_credit(credit.id).await.unwrap();
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].invoice_id, Some(older.id));
        assert_eq!(assignments[1].invoice_id, Some(newer.id));
        assert!(assignments.iter().all(|a| a.payment_id.is_some()));
    }

    #[tokio::test]
    async fn test_assignment_skips_when_regie_opts_out() {
        let env = TestEnv::new();
        let new_regie = test_utils::RegieBuilder::new()
            .with_label("Bar", "bar")
            .without_credit_assignment()
            .build();
        let regie = env.store.insert_regie(new_regie).await.unwrap();
        env.create_invoice(&regie, "payer:1", &[euros(10)]).await;
        let credit = env.create_credit(&regie, "payer:1", &[euros(15)]).await;

        let assigned = env
            .ledger
            .assign_credits_for_credit(credit.id, false)
            .await
            .unwrap();
        assert_eq!(assigned, 0);

        // forcing overrides the flag (campaign validation path)
        let assigned = env
            .ledger
            .assign_credits_for_credit(credit.id, true)
            .await
            .unwrap();
        assert_eq!(assigned, 1);
    }

    #[tokio::test]
    async fn test_invoice_side_assignment_respects_due_date() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        // the credit exists before the invoice, so nothing auto-assigns
        env.create_credit(&regie, "payer:1", &[euros(10)]).await;
        let invoice = env.create_invoice(&regie, "payer:1", &[euros(10)]).await;

        // past the due date nothing is assigned
        env.clock.set(
            test_utils::TemporalFixtures::now() + chrono::Duration::days(120),
        );
        let assigned = env
            .ledger
            .assign_credits_for_invoice(invoice.id)
            .await
            .unwrap();
        assert_eq!(assigned, 0);

        env.clock.set(test_utils::TemporalFixtures::now());
        let assigned = env
            .ledger
            .assign_credits_for_invoice(invoice.id)
            .await
            .unwrap();
        assert_eq!(assigned, 1);
        let invoice = env.store.invoice(invoice.id).await.unwrap();
        assert!(invoice.is_paid());
    }
}

mod refunds {
    use super::*;

    #[tokio::test]
    async fn test_refund_consumes_remaining_balance() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let credit = env.create_credit(&regie, "payer:1", &[euros(30)]).await;

        let refund = env.ledger.make_refund(credit.id, None).await.unwrap();
        assert_eq!(refund.amount, euros(30));
        assert!(refund.formatted_number.starts_with('V'));

        let credit = env.store.credit(credit.id).await.unwrap();
        assert_eq!(credit.remaining_amount, Amount::zero());
        assert_eq!(credit.assigned_amount, euros(30));

        let assignments = env.store.assignments_for_credit(credit.id).await.unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].refund_id, Some(refund.id));
        assert_eq!(assignments[0].invoice_id, None);

        // nothing left to refund
        let result = env.ledger.make_refund(credit.id, None).await;
        assert!(matches!(result, Err(LedgerError::InvalidOperation(_))));
    }
}

mod dockets {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_payment_docket_collects_and_numbers() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let invoice = env.create_invoice(&regie, "payer:1", &[euros(10)]).await;
        let cash = env
            .store
            .payment_type_get_or_create(regie.id, "cash", "Cash")
            .await
            .unwrap();
        let check = env
            .store
            .payment_type_get_or_create(regie.id, "check", "Check")
            .await
            .unwrap();

        let cash_payment = env
            .ledger
            .make_payment(PaymentRequest::new(regie.id, euros(4), cash.id, vec![invoice.id]))
            .await
            .unwrap();
        let check_payment = env
            .ledger
            .make_payment(PaymentRequest::new(regie.id, euros(6), check.id, vec![invoice.id]))
            .await
            .unwrap();

        let date_end = NaiveDate::from_ymd_opt(2022, 9, 30).unwrap();
        let docket = env
            .ledger
            .make_payment_docket(regie.id, date_end, vec![cash.id])
            .await
            .unwrap();
        assert!(docket.draft);
        assert!(docket.display_number().starts_with("TEMPORARY-"));

        // only the cash payment joins the docket
        let collected = env.store.payments_for_docket(docket.id).await.unwrap();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].id, cash_payment.id);
        let check_payment = env.store.payment(check_payment.id).await.unwrap();
        assert_eq!(check_payment.docket_id, None);

        let docket = env.ledger.finalize_payment_docket(docket.id).await.unwrap();
        assert!(!docket.draft);
        assert!(docket.formatted_number.starts_with('B'));

        // a docketed payment on a finalized docket cannot be cancelled
        let reason = env
            .store
            .insert_payment_cancellation_reason("Error".to_string(), "error".to_string())
            .await
            .unwrap();
        let result = env
            .ledger
            .cancel_payment(cash_payment.id, reason.id, None, String::new())
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_collection_docket_settles_overdue_invoices() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let invoice = env.create_invoice(&regie, "payer:1", &[euros(25)]).await;

        // collection covers invoices overdue before its end date
        let date_end = NaiveDate::from_ymd_opt(2022, 12, 31).unwrap();
        let docket = env
            .ledger
            .make_collection_docket(regie.id, date_end, true)
            .await
            .unwrap();
        let collected = env.store.invoices_for_collection(docket.id).await.unwrap();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].id, invoice.id);

        let docket = env
            .ledger
            .finalize_collection_docket(docket.id)
            .await
            .unwrap();
        assert!(docket.formatted_number.starts_with('T'));

        // pay_invoices settles the collected invoice with a collect payment
        let invoice = env.store.invoice(invoice.id).await.unwrap();
        assert!(invoice.is_paid());
        let collect_type = env
            .store
            .payment_type_get_or_create(regie.id, "collect", "Collect")
            .await
            .unwrap();
        let payments = env.store.line_payments_for_invoice(invoice.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        let payment = env.store.payment(payments[0].payment_id).await.unwrap();
        assert_eq!(payment.payment_type_id, collect_type.id);

        // a payment settling collected invoices cannot be cancelled
        let reason = env
            .store
            .insert_payment_cancellation_reason("Error".to_string(), "error".to_string())
            .await
            .unwrap();
        let result = env
            .ledger
            .cancel_payment(payment.id, reason.id, None, String::new())
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidOperation(_))));
    }
}

mod invariants {
    use super::*;

    /// Overdrawing a line through repeated payments is impossible: the
    /// allocation caps at each line's remaining amount
    #[tokio::test]
    async fn test_lines_never_overpaid_through_sequences() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let invoice = env
            .create_invoice(&regie, "payer:1", &[cents(1050), cents(295)])
            .await;
        let payment_type = env
            .store
            .payment_type_get_or_create(regie.id, "cash", "Cash")
            .await
            .unwrap();

        for amount in [cents(500), cents(500), cents(500), cents(500)] {
            let _ = env
                .ledger
                .make_payment(PaymentRequest::new(
                    regie.id,
                    amount,
                    payment_type.id,
                    vec![invoice.id],
                ))
                .await;
            for line in env.store.lines_for_invoice(invoice.id).await.unwrap() {
                assert!(line.paid_amount.abs() <= line.total_amount.abs());
                assert!(
                    line.paid_amount.same_sign_as(line.total_amount)
                        || line.paid_amount.is_zero()
                );
            }
        }

        let invoice = env.store.invoice(invoice.id).await.unwrap();
        assert_eq!(invoice.paid_amount, invoice.total_amount);
        assert_eq!(invoice.remaining_amount, Amount::zero());
    }

    #[tokio::test]
    async fn test_invoice_payments_view_aggregates_allocations() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let invoice = env
            .create_invoice(&regie, "payer:1", &[euros(10), euros(5)])
            .await;
        let payment_type = env
            .store
            .payment_type_get_or_create(regie.id, "cash", "Cash")
            .await
            .unwrap();

        let first = env
            .ledger
            .make_payment(PaymentRequest::new(
                regie.id,
                euros(12),
                payment_type.id,
                vec![invoice.id],
            ))
            .await
            .unwrap();
        let second = env
            .ledger
            .make_payment(PaymentRequest::new(
                regie.id,
                euros(3),
                payment_type.id,
                vec![invoice.id],
            ))
            .await
            .unwrap();

        let view = env.ledger.invoice_payments(invoice.id).await.unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].payment_id, first.id);
        assert_eq!(view[0].amount, euros(12));
        assert_eq!(view[1].payment_id, second.id);
        assert_eq!(view[1].amount, euros(3));
    }

    #[tokio::test]
    async fn test_invoice_numbering_is_sequential() {
        let env = TestEnv::new();
        let regie = env.create_regie("Foo", "foo").await;
        let first = env.create_invoice(&regie, "payer:1", &[euros(10)]).await;
        let second = env.create_invoice(&regie, "payer:2", &[euros(10)]).await;
        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert_eq!(first.formatted_number, "F01-22-09-0000001");
        assert_eq!(second.formatted_number, "F01-22-09-0000002");
    }
}
