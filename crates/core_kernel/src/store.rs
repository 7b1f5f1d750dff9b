//! The unified error type returned by every store port
//!
//! Domain services translate these into the caller-facing taxonomy:
//! transient variants become `StoreUnavailable` (safe to retry), permanent
//! variants become an internal error.

use thiserror::Error;

/// Errors from the durable store behind the ledger
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the connection
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer within the configured timeout
    #[error("Store operation timed out: {0}")]
    Timeout(String),

    /// The store rejected or failed the query
    #[error("Query failed: {0}")]
    Query(String),

    /// A persisted document could not be decoded
    #[error("Stored document corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        StoreError::Timeout(message.into())
    }

    pub fn query(message: impl Into<String>) -> Self {
        StoreError::Query(message.into())
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        StoreError::Corrupt(message.into())
    }

    /// True for failures that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_split() {
        assert!(StoreError::unavailable("connection refused").is_transient());
        assert!(StoreError::timeout("acquire").is_transient());
        assert!(!StoreError::query("syntax error").is_transient());
        assert!(!StoreError::corrupt("bad items payload").is_transient());
    }
}
