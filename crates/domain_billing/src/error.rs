//! Billing domain errors

use core_kernel::StoreError;
use thiserror::Error;

/// Errors surfaced by the ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or out-of-range input
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced record does not resolve
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation conflicts with existing state, including exhausted
    /// optimistic-lock retries
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Transient infrastructure failure, safe to retry
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Unclassified failure; details stay out of caller-facing messages
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        LedgerError::Conflict(message.into())
    }

    /// True for failures that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::StoreUnavailable(_))
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            LedgerError::StoreUnavailable(err.to_string())
        } else {
            LedgerError::Internal(err.to_string())
        }
    }
}
