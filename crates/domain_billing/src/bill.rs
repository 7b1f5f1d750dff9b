//! Bill entity and derived-field computation
//!
//! A bill aggregates line items, a discount, and a running balance for one
//! patient encounter. The four derived fields (`total_amount`,
//! `discounted_amount`, `remaining_amount`, `status`) are never written
//! independently: every mutation path re-derives them through
//! [`Totals::derive`] before the bill is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    AppointmentId, BillId, LabTestId, Money, PatientId, PaymentId, PrescriptionId, UserId,
};

use crate::error::LedgerError;
use crate::payment::Payment;
use crate::propagation::LinkSet;

/// Settlement status, derived from the remaining balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    /// No payment recorded yet
    Pending,
    /// Partially settled
    Partial,
    /// Fully settled
    Paid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::Partial => "partial",
            BillStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BillStatus::Pending),
            "partial" => Ok(BillStatus::Partial),
            "paid" => Ok(BillStatus::Paid),
            other => Err(format!("unknown bill status: {other}")),
        }
    }
}

/// Kind of service a line item charges for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Consultation,
    Procedure,
    LabTest,
    Medication,
    RoomCharge,
    Other,
}

/// A single charge on a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    pub description: String,
    pub category: ItemCategory,
    pub amount: Money,
}

impl BillItem {
    pub fn new(description: impl Into<String>, category: ItemCategory, amount: Money) -> Self {
        Self {
            description: description.into(),
            category,
            amount,
        }
    }
}

/// The derived fields of a bill, computed in one place
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub total: Money,
    pub discounted: Money,
    pub remaining: Money,
    pub status: BillStatus,
}

impl Totals {
    /// Derives every computed bill field from items, discount, and the
    /// persisted payment total.
    ///
    /// Fails with a validation error when an item amount or the discount is
    /// negative, when the discount exceeds the item total, or when the
    /// recorded payments would leave a negative remaining balance — a
    /// negative balance must never reach the store.
    pub fn derive(
        items: &[BillItem],
        discount: Money,
        paid: Money,
        payment_count: usize,
    ) -> Result<Totals, LedgerError> {
        for item in items {
            if item.amount.is_negative() {
                return Err(LedgerError::validation(format!(
                    "Item amount must not be negative: {} ({})",
                    item.description, item.amount
                )));
            }
        }
        if discount.is_negative() {
            return Err(LedgerError::validation(format!(
                "Discount must not be negative ({discount})"
            )));
        }

        let total: Money = items.iter().map(|item| item.amount).sum();
        if discount > total {
            return Err(LedgerError::validation(format!(
                "Discount ({discount}) exceeds the item total ({total})"
            )));
        }

        let discounted = total - discount;
        let remaining = discounted - paid;
        if remaining.is_negative() {
            return Err(LedgerError::validation(format!(
                "Bill total after discount ({discounted}) would fall below the recorded payments ({paid})"
            )));
        }

        let status = if payment_count == 0 {
            BillStatus::Pending
        } else if remaining.is_positive() {
            BillStatus::Partial
        } else {
            BillStatus::Paid
        };

        Ok(Totals {
            total,
            discounted,
            remaining,
            status,
        })
    }
}

/// Input for creating a bill
#[derive(Debug, Clone)]
pub struct NewBill {
    pub patient: PatientId,
    pub created_by: UserId,
    pub items: Vec<BillItem>,
    pub discount: Money,
    pub appointment: Option<AppointmentId>,
    pub lab_tests: Vec<LabTestId>,
    pub prescriptions: Vec<PrescriptionId>,
    pub notes: Option<String>,
}

/// A partial update to a bill; absent fields keep their stored value
#[derive(Debug, Clone, Default)]
pub struct BillPatch {
    pub items: Option<Vec<BillItem>>,
    pub discount: Option<Money>,
    pub notes: Option<String>,
}

impl BillPatch {
    pub fn is_empty(&self) -> bool {
        self.items.is_none() && self.discount.is_none() && self.notes.is_none()
    }
}

/// The billable record for one patient encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub patient: PatientId,
    pub created_by: UserId,
    pub items: Vec<BillItem>,
    pub discount: Money,
    pub total_amount: Money,
    pub discounted_amount: Money,
    pub remaining_amount: Money,
    pub status: BillStatus,
    /// Payment references in recording order
    pub payments: Vec<PaymentId>,
    pub appointment: Option<AppointmentId>,
    pub lab_tests: Vec<LabTestId>,
    pub prescriptions: Vec<PrescriptionId>,
    pub notes: Option<String>,
    /// Monotonic version for optimistic concurrency control
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// Creates a bill with all derived fields computed; no payments yet
    pub fn create(new: NewBill) -> Result<Bill, LedgerError> {
        let totals = Totals::derive(&new.items, new.discount, Money::ZERO, 0)?;
        let now = Utc::now();

        Ok(Bill {
            id: BillId::new_v7(),
            patient: new.patient,
            created_by: new.created_by,
            items: new.items,
            discount: new.discount,
            total_amount: totals.total,
            discounted_amount: totals.discounted,
            remaining_amount: totals.remaining,
            status: totals.status,
            payments: Vec::new(),
            appointment: new.appointment,
            lab_tests: new.lab_tests,
            prescriptions: new.prescriptions,
            notes: new.notes,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a patch and re-derives every computed field against the
    /// given persisted payment total.
    ///
    /// `paid` must come from the authoritative store state read inside the
    /// same atomic unit as the following write, never from an earlier call.
    pub fn apply_patch(&mut self, patch: BillPatch, paid: Money) -> Result<(), LedgerError> {
        if let Some(items) = patch.items {
            self.items = items;
        }
        if let Some(discount) = patch.discount {
            self.discount = discount;
        }
        if let Some(notes) = patch.notes {
            self.notes = Some(notes);
        }

        self.rederive(paid)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Appends a payment reference and re-derives the balance and status
    pub fn apply_payment(&mut self, payment: &Payment) -> Result<(), LedgerError> {
        let paid = (self.discounted_amount - self.remaining_amount) + payment.amount;
        self.payments.push(payment.id);
        self.rederive(paid)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn rederive(&mut self, paid: Money) -> Result<(), LedgerError> {
        let totals = Totals::derive(&self.items, self.discount, paid, self.payments.len())?;
        self.total_amount = totals.total;
        self.discounted_amount = totals.discounted;
        self.remaining_amount = totals.remaining;
        self.status = totals.status;
        Ok(())
    }

    pub fn has_payments(&self) -> bool {
        !self.payments.is_empty()
    }

    /// The links recorded on this bill, the intent the propagator applies
    pub fn link_set(&self) -> LinkSet {
        LinkSet {
            patient: self.patient,
            appointment: self.appointment,
            lab_tests: self.lab_tests.clone(),
            prescriptions: self.prescriptions.clone(),
        }
    }
}
