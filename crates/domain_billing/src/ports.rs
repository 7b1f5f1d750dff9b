//! Store ports for the billing domain
//!
//! The domain defines the ports; the infrastructure crate implements them
//! against PostgreSQL and the test utilities against an in-memory world.
//! Every mutating port operation is an atomic unit against the store;
//! compare-and-swap variants return `Ok(false)` on a lost version race so
//! the caller can re-read and retry.

use async_trait::async_trait;

use core_kernel::{BillId, DateRange, Money, PatientId, StoreError};

use crate::bill::{Bill, BillStatus};
use crate::payment::Payment;
use crate::propagation::LinkTarget;
use crate::statistics::{BillAggregates, MethodTotals};

/// Optional filters for bill listings; everything absent matches all bills
#[derive(Debug, Clone, Default)]
pub struct BillFilter {
    pub patient: Option<PatientId>,
    pub status: Option<BillStatus>,
    pub created: DateRange,
}

/// Durable storage for bills
#[async_trait]
pub trait BillStore: Send + Sync {
    async fn insert(&self, bill: &Bill) -> Result<(), StoreError>;

    async fn fetch(&self, id: BillId) -> Result<Option<Bill>, StoreError>;

    /// Compare-and-swap write: applies `bill` only while the stored version
    /// still equals `expected_version`. `Ok(false)` on a lost race.
    async fn update(&self, bill: &Bill, expected_version: i64) -> Result<bool, StoreError>;

    /// Conditional delete: removes the bill only while the stored version
    /// still equals `expected_version`. `Ok(false)` when missing or moved.
    async fn delete(&self, id: BillId, expected_version: i64) -> Result<bool, StoreError>;

    /// Matching bills, newest first
    async fn list(&self, filter: &BillFilter) -> Result<Vec<Bill>, StoreError>;

    /// Rollup over bills created in the range; zeroed when nothing matches
    async fn aggregate(&self, range: &DateRange) -> Result<BillAggregates, StoreError>;
}

/// Durable storage for payments
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// The payment-recording atomic unit: inserts the payment and
    /// compare-and-swap-commits the updated owning bill as one store
    /// transaction. `Ok(false)` when the bill's version moved or the
    /// payment's transaction id was already recorded for the bill; nothing
    /// is written in either case.
    async fn record(
        &self,
        payment: &Payment,
        bill: &Bill,
        expected_version: i64,
    ) -> Result<bool, StoreError>;

    /// Finds a payment previously recorded with this idempotency key
    async fn fetch_by_transaction(
        &self,
        bill: BillId,
        transaction_id: &str,
    ) -> Result<Option<Payment>, StoreError>;

    /// Payments for a bill, newest first
    async fn list_for_bill(&self, bill: BillId) -> Result<Vec<Payment>, StoreError>;

    /// The authoritative persisted payment total for a bill
    async fn total_for_bill(&self, bill: BillId) -> Result<Money, StoreError>;

    /// Count and summed amount per payment method over the range
    async fn method_breakdown(&self, range: &DateRange) -> Result<Vec<MethodTotals>, StoreError>;
}

/// Writes to the bill-reference fields of records owned by other
/// subsystems; each call touches exactly one document
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Sets the target's bill reference (or adds the bill to the patient's
    /// bill set). Idempotent.
    async fn attach(&self, target: LinkTarget, bill: BillId) -> Result<(), StoreError>;

    /// Clears the target's reference to the bill, if present. Idempotent.
    async fn detach(&self, target: LinkTarget, bill: BillId) -> Result<(), StoreError>;

    /// Every target currently referencing the bill
    async fn referencing(&self, bill: BillId) -> Result<Vec<LinkTarget>, StoreError>;
}
