//! Bill ledger service tests over the in-memory store

use core_kernel::{Money, PatientId};
use domain_billing::{BillFilter, BillPatch, BillStatus, LedgerError};
use test_utils::{BillBuilder, PaymentBuilder, TestHarness};

#[tokio::test]
async fn create_persists_derived_fields() {
    let h = TestHarness::new();

    let creation = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100, 50]).with_discount(20).build())
        .await
        .unwrap();

    assert!(creation.propagation.is_complete());

    let details = h.ledger.get_bill(creation.bill.id).await.unwrap();
    assert_eq!(details.bill.total_amount, Money::from_major(150));
    assert_eq!(details.bill.discounted_amount, Money::from_major(130));
    assert_eq!(details.bill.remaining_amount, Money::from_major(130));
    assert_eq!(details.bill.status, BillStatus::Pending);
    assert!(details.payments.is_empty());
}

#[tokio::test]
async fn create_rejects_negative_item_amounts() {
    let h = TestHarness::new();

    let mut new = BillBuilder::new().with_item_amounts(&[100]).build();
    new.items[0].amount = Money::ZERO - Money::from_major(10);

    let err = h.ledger.create_bill(new).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn get_bill_resolves_payments() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[200]).build())
        .await
        .unwrap()
        .bill;

    h.recorder
        .record_payment(bill.id, PaymentBuilder::new().with_amount(50).build())
        .await
        .unwrap();

    let details = h.ledger.get_bill(bill.id).await.unwrap();
    assert_eq!(details.payments.len(), 1);
    assert_eq!(details.bill.payments.len(), 1);
    assert_eq!(details.payments[0].amount, Money::from_major(50));
}

#[tokio::test]
async fn get_unknown_bill_is_not_found() {
    let h = TestHarness::new();
    let err = h.ledger.get_bill(core_kernel::BillId::new()).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[tokio::test]
async fn discount_update_recomputes_balance() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100, 50]).with_discount(20).build())
        .await
        .unwrap()
        .bill;

    let updated = h
        .ledger
        .update_bill(
            bill.id,
            BillPatch {
                discount: Some(Money::from_major(50)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.discounted_amount, Money::from_major(100));
    assert_eq!(updated.remaining_amount, Money::from_major(100));
    assert_eq!(updated.version, bill.version + 1);
}

#[tokio::test]
async fn update_subtracts_the_persisted_payment_total() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100]).build())
        .await
        .unwrap()
        .bill;

    h.recorder
        .record_payment(bill.id, PaymentBuilder::new().with_amount(40).build())
        .await
        .unwrap();

    // Growing the bill must keep the 40 already collected.
    let updated = h
        .ledger
        .update_bill(
            bill.id,
            BillPatch {
                items: Some(
                    BillBuilder::new().with_item_amounts(&[100, 100]).build().items,
                ),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.total_amount, Money::from_major(200));
    assert_eq!(updated.remaining_amount, Money::from_major(160));
    assert_eq!(updated.status, BillStatus::Partial);
}

#[tokio::test]
async fn update_that_undercuts_payments_is_rejected() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100]).build())
        .await
        .unwrap()
        .bill;

    h.recorder
        .record_payment(bill.id, PaymentBuilder::new().with_amount(90).build())
        .await
        .unwrap();

    let err = h
        .ledger
        .update_bill(
            bill.id,
            BillPatch {
                items: Some(BillBuilder::new().with_item_amounts(&[50]).build().items),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Validation(_)));

    // The stored bill is untouched.
    let details = h.ledger.get_bill(bill.id).await.unwrap();
    assert_eq!(details.bill.remaining_amount, Money::from_major(10));
}

#[tokio::test]
async fn update_unknown_bill_is_not_found() {
    let h = TestHarness::new();
    let err = h
        .ledger
        .update_bill(core_kernel::BillId::new(), BillPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_updates_both_land_through_retry() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100, 50]).build())
        .await
        .unwrap()
        .bill;

    let ledger_a = h.ledger.clone();
    let ledger_b = h.ledger.clone();
    let id = bill.id;

    let a = tokio::spawn(async move {
        ledger_a
            .update_bill(
                id,
                BillPatch {
                    discount: Some(Money::from_major(10)),
                    ..Default::default()
                },
            )
            .await
    });
    let b = tokio::spawn(async move {
        ledger_b
            .update_bill(
                id,
                BillPatch {
                    notes: Some("reviewed".to_string()),
                    ..Default::default()
                },
            )
            .await
    });

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // Both writes landed: two version bumps from the original.
    let details = h.ledger.get_bill(id).await.unwrap();
    assert_eq!(details.bill.version, bill.version + 2);
}

#[tokio::test]
async fn delete_refuses_bills_with_payments() {
    let h = TestHarness::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_item_amounts(&[100]).build())
        .await
        .unwrap()
        .bill;

    h.recorder
        .record_payment(bill.id, PaymentBuilder::new().with_amount(10).build())
        .await
        .unwrap();

    let err = h.ledger.delete_bill(bill.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));

    // Still there.
    assert!(h.ledger.get_bill(bill.id).await.is_ok());
}

#[tokio::test]
async fn delete_removes_unpaid_bills() {
    let h = TestHarness::new();
    let patient = PatientId::new();
    let bill = h
        .ledger
        .create_bill(BillBuilder::new().with_patient(patient).build())
        .await
        .unwrap()
        .bill;
    assert!(h.store.patient_bill_set(patient).contains(&bill.id));

    let deletion = h.ledger.delete_bill(bill.id).await.unwrap();
    assert!(deletion.propagation.is_complete());

    let err = h.ledger.get_bill(bill.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
    assert!(!h.store.patient_bill_set(patient).contains(&bill.id));
}

#[tokio::test]
async fn list_filters_by_patient_and_status() {
    let h = TestHarness::new();
    let patient = PatientId::new();

    let first = h
        .ledger
        .create_bill(BillBuilder::new().with_patient(patient).with_item_amounts(&[100]).build())
        .await
        .unwrap()
        .bill;
    let second = h
        .ledger
        .create_bill(BillBuilder::new().with_patient(patient).with_item_amounts(&[200]).build())
        .await
        .unwrap()
        .bill;
    h.ledger
        .create_bill(BillBuilder::new().build())
        .await
        .unwrap();

    h.recorder
        .record_payment(second.id, PaymentBuilder::new().with_amount(200).build())
        .await
        .unwrap();

    let mine = h
        .ledger
        .list_bills(BillFilter {
            patient: Some(patient),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);
    // Newest first.
    assert_eq!(mine[0].id, second.id);
    assert_eq!(mine[1].id, first.id);

    let paid = h
        .ledger
        .list_bills(BillFilter {
            patient: Some(patient),
            status: Some(BillStatus::Paid),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].id, second.id);
}
