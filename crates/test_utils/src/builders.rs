//! Test data builders
//!
//! Builders construct domain inputs with sensible defaults so tests only
//! spell out the fields they care about.

use rust_decimal_macros::dec;

use core_kernel::{AppointmentId, LabTestId, Money, PatientId, PrescriptionId, UserId};
use domain_billing::{BillItem, ItemCategory, NewBill, PaymentMethod, RecordPayment};

/// Builder for `NewBill`
pub struct BillBuilder {
    patient: PatientId,
    created_by: UserId,
    items: Vec<BillItem>,
    discount: Money,
    appointment: Option<AppointmentId>,
    lab_tests: Vec<LabTestId>,
    prescriptions: Vec<PrescriptionId>,
    notes: Option<String>,
}

impl Default for BillBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BillBuilder {
    /// A bill for one consultation at 500.00, no discount
    pub fn new() -> Self {
        Self {
            patient: PatientId::new(),
            created_by: UserId::new(),
            items: vec![BillItem::new(
                "General consultation",
                ItemCategory::Consultation,
                Money::new(dec!(500)),
            )],
            discount: Money::ZERO,
            appointment: None,
            lab_tests: Vec::new(),
            prescriptions: Vec::new(),
            notes: None,
        }
    }

    pub fn with_patient(mut self, patient: PatientId) -> Self {
        self.patient = patient;
        self
    }

    pub fn with_created_by(mut self, user: UserId) -> Self {
        self.created_by = user;
        self
    }

    /// Replaces the items with plain consultation charges of the given
    /// whole-unit amounts
    pub fn with_item_amounts(mut self, amounts: &[i64]) -> Self {
        self.items = amounts
            .iter()
            .map(|&a| {
                BillItem::new(
                    "Consultation",
                    ItemCategory::Consultation,
                    Money::from_major(a),
                )
            })
            .collect();
        self
    }

    pub fn with_items(mut self, items: Vec<BillItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_discount(mut self, discount: i64) -> Self {
        self.discount = Money::from_major(discount);
        self
    }

    pub fn with_appointment(mut self, appointment: AppointmentId) -> Self {
        self.appointment = Some(appointment);
        self
    }

    pub fn with_lab_tests(mut self, lab_tests: Vec<LabTestId>) -> Self {
        self.lab_tests = lab_tests;
        self
    }

    pub fn with_prescriptions(mut self, prescriptions: Vec<PrescriptionId>) -> Self {
        self.prescriptions = prescriptions;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn build(self) -> NewBill {
        NewBill {
            patient: self.patient,
            created_by: self.created_by,
            items: self.items,
            discount: self.discount,
            appointment: self.appointment,
            lab_tests: self.lab_tests,
            prescriptions: self.prescriptions,
            notes: self.notes,
        }
    }
}

/// Builder for `RecordPayment`
pub struct PaymentBuilder {
    amount: Money,
    method: PaymentMethod,
    transaction_id: Option<String>,
    notes: Option<String>,
    received_by: UserId,
}

impl Default for PaymentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentBuilder {
    /// A cash payment of 100.00
    pub fn new() -> Self {
        Self {
            amount: Money::new(dec!(100)),
            method: PaymentMethod::Cash,
            transaction_id: None,
            notes: None,
            received_by: UserId::new(),
        }
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Money::from_major(amount);
        self
    }

    pub fn with_exact_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_received_by(mut self, user: UserId) -> Self {
        self.received_by = user;
        self
    }

    pub fn build(self) -> RecordPayment {
        RecordPayment {
            amount: self.amount,
            method: self.method,
            transaction_id: self.transaction_id,
            notes: self.notes,
            received_by: self.received_by,
        }
    }
}
