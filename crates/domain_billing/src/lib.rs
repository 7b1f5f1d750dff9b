//! Billing Domain - Ledger and Payment Reconciliation
//!
//! This crate owns the bill ledger of the outpatient department manager:
//! computed bill totals, partial-payment tracking, settlement status, the
//! non-overpayment and non-deletion-with-history invariants, and the
//! propagation of bill references into the clinical records that point
//! back at a bill.
//!
//! # Components
//!
//! - [`BillLedger`]: bill lifecycle (create, recompute-on-update, guarded
//!   delete, lookups) over the store ports
//! - [`PaymentRecorder`]: append-only payment recording, serialized per
//!   bill through an optimistic version check
//! - [`Propagator`]: fan-out of bill references into appointments, lab
//!   tests, prescriptions, and the patient's bill set, with per-target
//!   outcome reporting and idempotent reconciliation
//! - [`StatisticsAggregator`]: read-only reporting rollups
//!
//! Every derived bill field flows through one pure derivation
//! ([`bill::Totals::derive`]); no mutation path writes totals by hand.

pub mod bill;
pub mod error;
pub mod ledger;
pub mod payment;
pub mod ports;
pub mod propagation;
pub mod recorder;
pub mod statistics;

pub use bill::{Bill, BillItem, BillPatch, BillStatus, ItemCategory, NewBill, Totals};
pub use error::LedgerError;
pub use ledger::{BillCreation, BillDeletion, BillDetails, BillLedger};
pub use payment::{Payment, PaymentMethod, RecordPayment};
pub use ports::{BillFilter, BillStore, LinkStore, PaymentStore};
pub use propagation::{LinkFailure, LinkSet, LinkTarget, PropagationReport, Propagator};
pub use recorder::{PaymentReceipt, PaymentRecorder};
pub use statistics::{BillAggregates, BillingStatistics, MethodTotals, StatisticsAggregator};
