//! Payment Recorder
//!
//! Appends payment records and commits the owning bill's derived state in
//! the same store transaction. This is the subsystem's critical section:
//! two concurrent payments against one bill must never both read a stale
//! remaining balance and drive it negative, so every attempt validates
//! against a fresh read and commits through the version compare-and-swap.

use std::sync::Arc;
use tracing::info;

use core_kernel::BillId;

use crate::bill::Bill;
use crate::error::LedgerError;
use crate::payment::{Payment, RecordPayment};
use crate::ports::{BillStore, PaymentStore};

/// Attempts before a version race is reported as a conflict
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// A recorded payment together with the bill state it produced
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub bill: Bill,
}

/// The payment-recording service
#[derive(Clone)]
pub struct PaymentRecorder {
    bills: Arc<dyn BillStore>,
    payments: Arc<dyn PaymentStore>,
}

impl PaymentRecorder {
    pub fn new(bills: Arc<dyn BillStore>, payments: Arc<dyn PaymentStore>) -> Self {
        Self { bills, payments }
    }

    /// Records a payment against a bill.
    ///
    /// Preconditions, checked against the persisted bill inside each
    /// attempt: the bill exists, the amount is strictly positive, and the
    /// amount does not exceed the current remaining balance. A supplied
    /// `transaction_id` acts as an idempotency key: replaying a recorded
    /// transaction returns the original payment instead of a duplicate.
    pub async fn record_payment(
        &self,
        bill_id: BillId,
        record: RecordPayment,
    ) -> Result<PaymentReceipt, LedgerError> {
        if !record.amount.is_positive() {
            return Err(LedgerError::validation(
                "Payment amount must be greater than 0",
            ));
        }

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut bill = self
                .bills
                .fetch(bill_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Bill", bill_id))?;

            if let Some(transaction_id) = record.transaction_id.as_deref() {
                if let Some(existing) = self
                    .payments
                    .fetch_by_transaction(bill_id, transaction_id)
                    .await?
                {
                    info!(bill = %bill_id, payment = %existing.id, "payment replayed by transaction id");
                    return Ok(PaymentReceipt {
                        payment: existing,
                        bill,
                    });
                }
            }

            if record.amount > bill.remaining_amount {
                return Err(LedgerError::validation(format!(
                    "Payment amount exceeds remaining amount ({})",
                    bill.remaining_amount
                )));
            }

            let mut payment = Payment::new(
                bill_id,
                bill.patient,
                record.amount,
                record.method,
                record.received_by,
            );
            if let Some(transaction_id) = record.transaction_id.clone() {
                payment = payment.with_transaction_id(transaction_id);
            }
            if let Some(notes) = record.notes.clone() {
                payment = payment.with_notes(notes);
            }

            let expected = bill.version;
            bill.apply_payment(&payment)?;
            bill.version = expected + 1;

            if self.payments.record(&payment, &bill, expected).await? {
                info!(
                    bill = %bill_id,
                    payment = %payment.id,
                    amount = %payment.amount,
                    status = %bill.status,
                    "payment recorded"
                );
                return Ok(PaymentReceipt { payment, bill });
            }
            // Lost the race against another payment or bill write;
            // re-read and re-validate against the fresh balance.
        }
        Err(LedgerError::conflict(format!(
            "Concurrent payment activity on bill {bill_id}"
        )))
    }

    /// Payments recorded for a bill, newest first
    pub async fn bill_payments(&self, bill_id: BillId) -> Result<Vec<Payment>, LedgerError> {
        if self.bills.fetch(bill_id).await?.is_none() {
            return Err(LedgerError::not_found("Bill", bill_id));
        }
        Ok(self.payments.list_for_bill(bill_id).await?)
    }
}
