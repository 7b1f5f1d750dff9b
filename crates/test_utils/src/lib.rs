//! Test Utilities
//!
//! Shared test infrastructure for the ledger workspace:
//!
//! - `memory`: an in-memory implementation of all three store ports with
//!   real compare-and-swap semantics and per-target failure injection
//! - `builders`: builder patterns for test data with sensible defaults
//! - `harness`: pre-wired services over the in-memory store

pub mod builders;
pub mod harness;
pub mod memory;

pub use builders::{BillBuilder, PaymentBuilder};
pub use harness::TestHarness;
pub use memory::MemoryStore;
