//! Port implementations over PostgreSQL

pub mod bills;
pub mod links;
pub mod payments;

pub use bills::PgBillStore;
pub use links::PgLinkStore;
pub use payments::PgPaymentStore;
