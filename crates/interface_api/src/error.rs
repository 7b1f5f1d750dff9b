//! API error handling
//!
//! Every error leaves the API as the `{status: "error", message}` envelope.
//! Validation and conflict failures both map to 400 (the mapping inherited
//! from the original surface), transient store failures to 503, and
//! anything unclassified to a generic 500 with the detail kept in the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use domain_billing::LedgerError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Something went wrong")]
    Internal,
}

/// The error half of the response envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(message) => ApiError::Validation(message),
            LedgerError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            LedgerError::Conflict(message) => ApiError::Conflict(message),
            LedgerError::StoreUnavailable(message) => ApiError::ServiceUnavailable(message),
            LedgerError::Internal(detail) => {
                // The detail stays in the logs; the caller gets a generic
                // message.
                error!(%detail, "unclassified ledger failure");
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_error_mapping() {
        let api: ApiError = LedgerError::validation("bad amount").into();
        assert!(matches!(api, ApiError::Validation(_)));

        let api: ApiError = LedgerError::conflict("has payments").into();
        assert!(matches!(api, ApiError::Conflict(_)));

        let api: ApiError = LedgerError::not_found("Bill", "x").into();
        assert!(matches!(api, ApiError::NotFound(_)));

        let api: ApiError = LedgerError::Internal("secret detail".to_string()).into();
        assert_eq!(api.to_string(), "Something went wrong");
    }
}
