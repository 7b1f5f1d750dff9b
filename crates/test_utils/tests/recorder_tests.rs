//! Payment recorder tests, including the concurrency properties
//!
//! Payment recording is the subsystem's critical section; the tests here
//! race real tasks through the store's compare-and-swap to check that no
//! interleaving can overdraw a bill.

use std::sync::Arc;

use core_kernel::{BillId, Money};
use domain_billing::{BillStatus, LedgerError, PaymentMethod};
use test_utils::{BillBuilder, PaymentBuilder, TestHarness};

#[tokio::test]
async fn full_payment_settles_the_bill() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100, 50]).with_discount(20).build())
        .await
        .unwrap()
        .bill;

    let receipt = h
        .recorder
        .record_payment(bill.id, PaymentBuilder::new().with_amount(130).build())
        .await
        .unwrap();

    assert_eq!(receipt.bill.remaining_amount, Money::ZERO);
    assert_eq!(receipt.bill.status, BillStatus::Paid);
    assert_eq!(receipt.payment.amount, Money::from_major(130));
    assert_eq!(receipt.payment.patient, bill.patient);
}

#[tokio::test]
async fn partial_payment_leaves_the_bill_partial() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100, 50]).with_discount(20).build())
        .await
        .unwrap()
        .bill;

    let receipt = h
        .recorder
        .record_payment(bill.id, PaymentBuilder::new().with_amount(80).build())
        .await
        .unwrap();

    assert_eq!(receipt.bill.remaining_amount, Money::from_major(50));
    assert_eq!(receipt.bill.status, BillStatus::Partial);
}

#[tokio::test]
async fn overpayment_is_rejected_with_the_current_remaining_amount() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100, 50]).with_discount(20).build())
        .await
        .unwrap()
        .bill;

    let err = h
        .recorder
        .record_payment(bill.id, PaymentBuilder::new().with_amount(200).build())
        .await
        .unwrap_err();

    match err {
        LedgerError::Validation(message) => {
            assert!(message.contains("130"), "message should carry the remaining amount: {message}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().build())
        .await
        .unwrap()
        .bill;

    let err = h
        .recorder
        .record_payment(bill.id, PaymentBuilder::new().with_amount(0).build())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(h.store.payment_count(), 0);
}

#[tokio::test]
async fn payment_on_unknown_bill_is_not_found() {
    let h = TestHarness::new();
    let err = h
        .recorder
        .record_payment(BillId::new(), PaymentBuilder::new().build())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[tokio::test]
async fn replayed_transaction_id_returns_the_original_payment() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100]).build())
        .await
        .unwrap()
        .bill;

    let first = h
        .recorder
        .record_payment(
            bill.id,
            PaymentBuilder::new().with_amount(40).with_transaction_id("TXN-7").build(),
        )
        .await
        .unwrap();
    let second = h
        .recorder
        .record_payment(
            bill.id,
            PaymentBuilder::new().with_amount(40).with_transaction_id("TXN-7").build(),
        )
        .await
        .unwrap();

    assert_eq!(first.payment.id, second.payment.id);
    assert_eq!(h.store.payment_count(), 1);

    let details = h.ledger.get_bill(bill.id).await.unwrap();
    assert_eq!(details.bill.remaining_amount, Money::from_major(60));
}

#[tokio::test]
async fn payments_list_newest_first() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100]).build())
        .await
        .unwrap()
        .bill;

    h.recorder
        .record_payment(
            bill.id,
            PaymentBuilder::new().with_amount(30).with_method(PaymentMethod::Cash).build(),
        )
        .await
        .unwrap();
    h.recorder
        .record_payment(
            bill.id,
            PaymentBuilder::new().with_amount(70).with_method(PaymentMethod::Card).build(),
        )
        .await
        .unwrap();

    let payments = h.recorder.bill_payments(bill.id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0].amount, Money::from_major(70));
    assert_eq!(payments[1].amount, Money::from_major(30));
}

#[tokio::test]
async fn payments_for_unknown_bill_are_not_found() {
    let h = TestHarness::new();
    let err = h.recorder.bill_payments(BillId::new()).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

/// Two racing payments of 80 against a remaining balance of 130: exactly
/// one must win, the other must be rejected as exceeding the remainder.
#[tokio::test(flavor = "multi_thread")]
async fn racing_payments_never_overdraw() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100, 50]).with_discount(20).build())
        .await
        .unwrap()
        .bill;

    let recorder_a = h.recorder.clone();
    let recorder_b = h.recorder.clone();
    let id = bill.id;

    let a = tokio::spawn(async move {
        recorder_a
            .record_payment(id, PaymentBuilder::new().with_amount(80).build())
            .await
    });
    let b = tokio::spawn(async move {
        recorder_b
            .record_payment(id, PaymentBuilder::new().with_amount(80).build())
            .await
    });

    let outcomes = [a.await.unwrap(), b.await.unwrap()];
    let successes = outcomes.iter().filter(|o| o.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of two 80s may land on 130");

    let details = h.ledger.get_bill(id).await.unwrap();
    assert_eq!(details.bill.remaining_amount, Money::from_major(50));
    assert!(!details.bill.remaining_amount.is_negative());
}

/// Many concurrent attempts whose amounts sum to far more than the
/// balance: the accepted total must never exceed the original remainder,
/// whatever the interleaving.
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_payment_storm_respects_the_balance() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[500]).build())
        .await
        .unwrap()
        .bill;

    let recorder = Arc::new(h.recorder.clone());
    let mut handles = Vec::new();
    for i in 0..20i64 {
        let recorder = Arc::clone(&recorder);
        let id = bill.id;
        let amount = 40 + (i % 5) * 20;
        handles.push(tokio::spawn(async move {
            recorder
                .record_payment(id, PaymentBuilder::new().with_amount(amount).build())
                .await
        }));
    }

    let mut accepted = Money::ZERO;
    for handle in handles {
        if let Ok(receipt) = handle.await.unwrap() {
            accepted += receipt.payment.amount;
        }
    }

    assert!(accepted <= Money::from_major(500));

    let details = h.ledger.get_bill(bill.id).await.unwrap();
    assert!(!details.bill.remaining_amount.is_negative());
    assert_eq!(details.bill.remaining_amount, Money::from_major(500) - accepted);

    let persisted_total: Money = details.payments.iter().map(|p| p.amount).sum();
    assert_eq!(persisted_total, accepted);
}

/// A payment and a deletion racing on one bill must agree: either the
/// payment landed and the delete is refused, or the bill is gone and no
/// payment was recorded.
#[tokio::test(flavor = "multi_thread")]
async fn delete_racing_a_payment_stays_consistent() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100]).build())
        .await
        .unwrap()
        .bill;

    let recorder = h.recorder.clone();
    let ledger = h.ledger.clone();
    let id = bill.id;

    let pay = tokio::spawn(async move {
        recorder
            .record_payment(id, PaymentBuilder::new().with_amount(50).build())
            .await
    });
    let del = tokio::spawn(async move { ledger.delete_bill(id).await });

    let pay_result = pay.await.unwrap();
    let del_result = del.await.unwrap();

    match h.ledger.get_bill(id).await {
        Ok(details) => {
            // The payment won; the deletion must have been refused.
            assert!(pay_result.is_ok());
            assert!(matches!(del_result, Err(LedgerError::Conflict(_))));
            assert_eq!(details.payments.len(), 1);
        }
        Err(LedgerError::NotFound { .. }) => {
            // The deletion won; no payment may exist.
            assert!(del_result.is_ok());
            assert!(pay_result.is_err());
            assert_eq!(h.store.payment_count(), 0);
        }
        Err(other) => panic!("unexpected error: {other:?}"),
    }
}
