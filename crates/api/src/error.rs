//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::ErrorKind;
use ledger::LedgerError;
use saga::SagaError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Saga or ledger error.
    Saga(SagaError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    let status = match &err {
        SagaError::Ledger(LedgerError::TransactionNotFound(_)) => StatusCode::NOT_FOUND,
        SagaError::Ledger(LedgerError::ConcurrencyConflict { .. }) | SagaError::InvalidState { .. } => {
            StatusCode::CONFLICT
        }
        other => match other.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Dependency | ErrorKind::Payment | ErrorKind::Inventory => {
                StatusCode::BAD_GATEWAY
            }
            ErrorKind::CompensationFailure | ErrorKind::Persistence | ErrorKind::Internal => {
                tracing::error!(error = %err, "saga error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    };
    (status, err.to_string())
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}
