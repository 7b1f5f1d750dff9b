//! Payment records
//!
//! A payment is an immutable record of funds applied against a bill.
//! Payments are append-only: this subsystem has no reversal or refund
//! path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{BillId, Money, PatientId, PaymentId, UserId};

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Insurance,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Insurance => "insurance",
            PaymentMethod::Online => "online",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "insurance" => Ok(PaymentMethod::Insurance),
            "online" => Ok(PaymentMethod::Online),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// An immutable record of funds applied against a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    /// The owning bill; never changes after creation
    pub bill: BillId,
    /// Denormalized from the bill at creation time
    pub patient: PatientId,
    pub amount: Money,
    pub method: PaymentMethod,
    /// External reference; doubles as the idempotency key for retries
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub received_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        bill: BillId,
        patient: PatientId,
        amount: Money,
        method: PaymentMethod,
        received_by: UserId,
    ) -> Self {
        Self {
            id: PaymentId::new_v7(),
            bill,
            patient,
            amount,
            method,
            transaction_id: None,
            notes: None,
            received_by,
            created_at: Utc::now(),
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Input for recording a payment against a bill
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub amount: Money,
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub received_by: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn builder_fields() {
        let payment = Payment::new(
            BillId::new(),
            PatientId::new(),
            Money::new(dec!(80)),
            PaymentMethod::Card,
            UserId::new(),
        )
        .with_transaction_id("TXN-42")
        .with_notes("front desk");

        assert_eq!(payment.transaction_id.as_deref(), Some("TXN-42"));
        assert_eq!(payment.notes.as_deref(), Some("front desk"));
        assert_eq!(payment.method, PaymentMethod::Card);
    }

    #[test]
    fn method_parse_round_trip() {
        for method in [
            PaymentMethod::Cash,
            PaymentMethod::Card,
            PaymentMethod::BankTransfer,
            PaymentMethod::Insurance,
            PaymentMethod::Online,
        ] {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), method);
        }
        assert!("crypto".parse::<PaymentMethod>().is_err());
    }
}
