//! Store Infrastructure
//!
//! PostgreSQL implementations of the billing domain's store ports using
//! SQLx with runtime-checked queries. The ledger treats the database as a
//! document store with single-document atomic updates; multi-row atomicity
//! (payment insert + bill commit) uses a store transaction.

pub mod error;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_pool_from_url, StoreConfig, StorePool};
pub use repositories::{PgBillStore, PgLinkStore, PgPaymentStore};

/// Embedded schema migrations, applied at server startup
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();
