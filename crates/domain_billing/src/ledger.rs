//! Bill Ledger Core
//!
//! Owns the bill lifecycle: creation, recompute-on-update, guarded
//! deletion, lookups, and the link-reconciliation entry point. All
//! mutations serialize per bill through the store's version
//! compare-and-swap; operations on different bills never contend.

use std::sync::Arc;
use tracing::{info, warn};

use core_kernel::BillId;

use crate::bill::{Bill, BillPatch, NewBill};
use crate::error::LedgerError;
use crate::payment::Payment;
use crate::ports::{BillFilter, BillStore, PaymentStore};
use crate::propagation::{PropagationReport, Propagator};

/// Attempts before a version race is reported as a conflict
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// A created bill together with the link fan-out outcome
#[derive(Debug, Clone)]
pub struct BillCreation {
    pub bill: Bill,
    pub propagation: PropagationReport,
}

/// Outcome of a deletion: which links were detached
#[derive(Debug, Clone)]
pub struct BillDeletion {
    pub propagation: PropagationReport,
}

/// A bill with the records the ledger owns resolved
#[derive(Debug, Clone)]
pub struct BillDetails {
    pub bill: Bill,
    pub payments: Vec<Payment>,
}

/// The bill lifecycle service
#[derive(Clone)]
pub struct BillLedger {
    bills: Arc<dyn BillStore>,
    payments: Arc<dyn PaymentStore>,
    propagator: Propagator,
}

impl BillLedger {
    pub fn new(
        bills: Arc<dyn BillStore>,
        payments: Arc<dyn PaymentStore>,
        propagator: Propagator,
    ) -> Self {
        Self {
            bills,
            payments,
            propagator,
        }
    }

    /// Creates a bill and attaches its id to every linked record.
    ///
    /// The bill document itself carries the link intent, so it is
    /// persisted first; the fan-out result is returned beside the bill
    /// rather than rolling anything back.
    pub async fn create_bill(&self, new: NewBill) -> Result<BillCreation, LedgerError> {
        let bill = Bill::create(new)?;
        self.bills.insert(&bill).await?;
        info!(bill = %bill.id, patient = %bill.patient, total = %bill.total_amount, "bill created");

        let propagation = self.propagator.attach(bill.id, &bill.link_set()).await;
        if !propagation.is_complete() {
            warn!(
                bill = %bill.id,
                failed = propagation.failed.len(),
                "bill created with incomplete link propagation"
            );
        }
        Ok(BillCreation { bill, propagation })
    }

    /// Applies a patch, re-deriving all computed fields against the
    /// payment total read from the store inside the same retry round as
    /// the compare-and-swap write.
    pub async fn update_bill(&self, id: BillId, patch: BillPatch) -> Result<Bill, LedgerError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut bill = self.require(id).await?;
            let expected = bill.version;

            let paid = self.payments.total_for_bill(id).await?;
            bill.apply_patch(patch.clone(), paid)?;
            bill.version = expected + 1;

            if self.bills.update(&bill, expected).await? {
                info!(bill = %id, remaining = %bill.remaining_amount, "bill updated");
                return Ok(bill);
            }
            // Lost the version race; re-read and recompute.
        }
        Err(LedgerError::conflict(format!(
            "Concurrent modification of bill {id}"
        )))
    }

    /// Deletes a bill that has no payments and detaches its references.
    ///
    /// The delete is conditioned on the version observed when the payment
    /// guard was checked, so a payment landing in between makes the delete
    /// lose the race and the guard re-runs. Detachment happens after the
    /// record is gone; an interrupted fan-out is recoverable through
    /// [`Self::reconcile_links`], which clears dangling references.
    pub async fn delete_bill(&self, id: BillId) -> Result<BillDeletion, LedgerError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let bill = self.require(id).await?;
            if bill.has_payments() {
                return Err(LedgerError::conflict("Cannot delete a bill with payments"));
            }

            if !self.bills.delete(id, bill.version).await? {
                // A concurrent write moved the version; re-check the guard.
                continue;
            }

            let propagation = self.propagator.detach(id, &bill.link_set()).await;
            if !propagation.is_complete() {
                warn!(
                    bill = %id,
                    failed = propagation.failed.len(),
                    "bill deleted with incomplete link detachment"
                );
            }
            info!(bill = %id, "bill deleted");
            return Ok(BillDeletion { propagation });
        }
        Err(LedgerError::conflict(format!(
            "Concurrent modification of bill {id}"
        )))
    }

    /// The bill with its payment records resolved
    pub async fn get_bill(&self, id: BillId) -> Result<BillDetails, LedgerError> {
        let bill = self.require(id).await?;
        let payments = self.payments.list_for_bill(id).await?;
        Ok(BillDetails { bill, payments })
    }

    /// Matching bills, newest first
    pub async fn list_bills(&self, filter: BillFilter) -> Result<Vec<Bill>, LedgerError> {
        Ok(self.bills.list(&filter).await?)
    }

    /// Replays the propagation intent for a bill: re-attaches the links of
    /// an existing bill, or clears dangling references to a deleted one.
    /// Safe to call any number of times.
    pub async fn reconcile_links(&self, id: BillId) -> Result<PropagationReport, LedgerError> {
        match self.bills.fetch(id).await? {
            Some(bill) => Ok(self.propagator.attach(id, &bill.link_set()).await),
            None => Ok(self.propagator.detach_dangling(id).await?),
        }
    }

    async fn require(&self, id: BillId) -> Result<Bill, LedgerError> {
        self.bills
            .fetch(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Bill", id))
    }
}
