//! Entity-level billing tests
//!
//! Exercises the pure ledger arithmetic through full bill lifecycles;
//! service-level and concurrency tests live with the shared test store.

use rust_decimal_macros::dec;

use core_kernel::{Money, PatientId, UserId};
use domain_billing::{
    Bill, BillItem, BillPatch, BillStatus, ItemCategory, NewBill, Payment, PaymentMethod,
};

fn new_bill(amounts: &[i64], discount: i64) -> Bill {
    let items = amounts
        .iter()
        .map(|&a| {
            BillItem::new(
                "OPD consultation",
                ItemCategory::Consultation,
                Money::from_major(a),
            )
        })
        .collect();

    Bill::create(NewBill {
        patient: PatientId::new(),
        created_by: UserId::new(),
        items,
        discount: Money::from_major(discount),
        appointment: None,
        lab_tests: Vec::new(),
        prescriptions: Vec::new(),
        notes: None,
    })
    .expect("bill should be valid")
}

fn pay(bill: &mut Bill, amount: i64) -> Payment {
    let payment = Payment::new(
        bill.id,
        bill.patient,
        Money::from_major(amount),
        PaymentMethod::Cash,
        UserId::new(),
    );
    bill.apply_payment(&payment).expect("payment should apply");
    payment
}

#[test]
fn settles_over_a_sequence_of_partial_payments() {
    let mut bill = new_bill(&[100, 50], 20);
    assert_eq!(bill.remaining_amount, Money::from_major(130));
    assert_eq!(bill.status, BillStatus::Pending);

    pay(&mut bill, 80);
    assert_eq!(bill.remaining_amount, Money::from_major(50));
    assert_eq!(bill.status, BillStatus::Partial);

    pay(&mut bill, 50);
    assert_eq!(bill.remaining_amount, Money::ZERO);
    assert_eq!(bill.status, BillStatus::Paid);
    assert_eq!(bill.payments.len(), 2);
}

#[test]
fn discount_change_after_a_payment_keeps_the_collected_amount() {
    let mut bill = new_bill(&[100, 50], 20);
    pay(&mut bill, 30);

    // The recorder has persisted 30; an item/discount update must subtract
    // it rather than resetting the balance.
    bill.apply_patch(
        BillPatch {
            discount: Some(Money::from_major(50)),
            ..Default::default()
        },
        Money::from_major(30),
    )
    .unwrap();

    assert_eq!(bill.discounted_amount, Money::from_major(100));
    assert_eq!(bill.remaining_amount, Money::from_major(70));
    assert_eq!(bill.status, BillStatus::Partial);
}

#[test]
fn patch_that_undercuts_payments_is_rejected() {
    let mut bill = new_bill(&[100], 0);
    pay(&mut bill, 90);

    let result = bill.apply_patch(
        BillPatch {
            items: Some(vec![BillItem::new(
                "Reduced charge",
                ItemCategory::Other,
                Money::from_major(50),
            )]),
            ..Default::default()
        },
        Money::from_major(90),
    );
    assert!(result.is_err());
}

#[test]
fn fractional_amounts_stay_on_the_cent_grid() {
    let items = vec![
        BillItem::new("X-ray", ItemCategory::Procedure, Money::new(dec!(99.99))),
        BillItem::new("Film fee", ItemCategory::Other, Money::new(dec!(0.26))),
    ];
    let bill = Bill::create(NewBill {
        patient: PatientId::new(),
        created_by: UserId::new(),
        items,
        discount: Money::new(dec!(0.25)),
        appointment: None,
        lab_tests: Vec::new(),
        prescriptions: Vec::new(),
        notes: None,
    })
    .unwrap();

    assert_eq!(bill.total_amount.amount(), dec!(100.25));
    assert_eq!(bill.discounted_amount.amount(), dec!(100.00));
    assert_eq!(bill.remaining_amount.amount(), dec!(100.00));
}

#[test]
fn status_serializes_lowercase() {
    assert_eq!(
        serde_json::to_string(&BillStatus::Partial).unwrap(),
        "\"partial\""
    );
    assert_eq!(
        serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
        "\"bank_transfer\""
    );
}
