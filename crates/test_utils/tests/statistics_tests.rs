//! Statistics aggregator tests

use chrono::{Duration, Utc};

use core_kernel::{DateRange, Money, PatientId};
use domain_billing::PaymentMethod;
use test_utils::{BillBuilder, PaymentBuilder, TestHarness};

#[tokio::test]
async fn empty_range_returns_zeroed_aggregates() {
    let h = TestHarness::new();
    h.ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100]).build())
        .await
        .unwrap();

    // A window far in the past matches nothing and must not error.
    let stats = h
        .stats
        .billing_statistics(DateRange::until(Utc::now() - Duration::days(365)))
        .await
        .unwrap();

    assert_eq!(stats.bills.total_bills, 0);
    assert_eq!(stats.bills.total_amount, Money::ZERO);
    assert_eq!(stats.bills.collected_amount, Money::ZERO);
    assert_eq!(stats.bills.pending_amount, Money::ZERO);
    assert!(stats.methods.is_empty());
}

#[tokio::test]
async fn aggregates_roll_up_bills_and_payments() {
    let h = TestHarness::new();

    let first = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100, 50]).with_discount(20).build())
        .await
        .unwrap()
        .bill;
    let second = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[200]).build())
        .await
        .unwrap()
        .bill;

    h.recorder
        .record_payment(
            first.id,
            PaymentBuilder::new().with_amount(80).with_method(PaymentMethod::Cash).build(),
        )
        .await
        .unwrap();
    h.recorder
        .record_payment(
            second.id,
            PaymentBuilder::new().with_amount(200).with_method(PaymentMethod::Card).build(),
        )
        .await
        .unwrap();
    h.recorder
        .record_payment(
            first.id,
            PaymentBuilder::new().with_amount(20).with_method(PaymentMethod::Cash).build(),
        )
        .await
        .unwrap();

    let stats = h.stats.billing_statistics(DateRange::all()).await.unwrap();

    assert_eq!(stats.bills.total_bills, 2);
    assert_eq!(stats.bills.total_amount, Money::from_major(350));
    assert_eq!(stats.bills.discounted_amount, Money::from_major(330));
    assert_eq!(stats.bills.collected_amount, Money::from_major(300));
    assert_eq!(stats.bills.pending_amount, Money::from_major(30));

    assert_eq!(stats.methods.len(), 2);
    let cash = stats
        .methods
        .iter()
        .find(|m| m.method == PaymentMethod::Cash)
        .unwrap();
    assert_eq!(cash.count, 2);
    assert_eq!(cash.amount, Money::from_major(100));
    let card = stats
        .methods
        .iter()
        .find(|m| m.method == PaymentMethod::Card)
        .unwrap();
    assert_eq!(card.count, 1);
    assert_eq!(card.amount, Money::from_major(200));
}

#[tokio::test]
async fn range_bounds_filter_by_creation_time() {
    let h = TestHarness::new();
    h.ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100]).build())
        .await
        .unwrap();

    let window = DateRange::between(Utc::now() - Duration::hours(1), Utc::now() + Duration::hours(1));
    let inside = h.stats.billing_statistics(window).await.unwrap();
    assert_eq!(inside.bills.total_bills, 1);

    let future = DateRange::from(Utc::now() + Duration::hours(1));
    let outside = h.stats.billing_statistics(future).await.unwrap();
    assert_eq!(outside.bills.total_bills, 0);
}

#[tokio::test]
async fn patient_bills_newest_first() {
    let h = TestHarness::new();
    let patient = PatientId::new();

    let older = h
        .ledger
        .create_bill(BillBuilder::new().with_patient(patient).build())
        .await
        .unwrap()
        .bill;
    let newer = h
        .ledger
        .create_bill(BillBuilder::new().with_patient(patient).build())
        .await
        .unwrap()
        .bill;
    h.ledger.create_bill(BillBuilder::new().build()).await.unwrap();

    let bills = h.stats.patient_bills(patient).await.unwrap();
    assert_eq!(bills.len(), 2);
    assert_eq!(bills[0].id, newer.id);
    assert_eq!(bills[1].id, older.id);
}
