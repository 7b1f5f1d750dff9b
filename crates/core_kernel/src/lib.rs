//! Core Kernel - Foundational types for the OPD billing ledger
//!
//! This crate provides the building blocks used across the billing domain:
//! - A single-currency money type with precise decimal arithmetic
//! - Strongly-typed identifiers for clinical and billing entities
//! - The caller principal consumed from the external auth collaborator
//! - Date ranges for reporting filters
//! - The unified store error every persistence port returns

pub mod identifiers;
pub mod money;
pub mod principal;
pub mod store;
pub mod temporal;

pub use identifiers::{
    AppointmentId, BillId, LabTestId, PatientId, PaymentId, PrescriptionId, UserId,
};
pub use money::{Money, MoneyError};
pub use principal::{Principal, Role};
pub use store::StoreError;
pub use temporal::DateRange;
