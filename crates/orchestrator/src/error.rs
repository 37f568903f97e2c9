//! Orchestrator error types.

use std::time::Duration;

use common::ErrorKind;
use saga::CheckoutOutcome;
use thiserror::Error;

/// Failure of an external collaborator call.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// The collaborator could not be reached or returned an error.
    #[error("{collaborator} unavailable: {message}")]
    Unavailable {
        collaborator: &'static str,
        message: String,
    },

    /// The collaborator did not answer in time.
    #[error("{collaborator} timed out after {after:?}")]
    Timeout {
        collaborator: &'static str,
        after: Duration,
    },

    /// The collaborator answered with something unusable.
    #[error("{collaborator} returned an invalid response: {message}")]
    InvalidResponse {
        collaborator: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn unavailable(collaborator: &'static str, message: impl Into<String>) -> Self {
        CollaboratorError::Unavailable {
            collaborator,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Dependency
    }
}

/// Errors produced while handling an orchestration request.
///
/// None of these escape [`RequestOrchestrator::orchestrate`](crate::RequestOrchestrator::orchestrate);
/// they are converted into a failed result.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The request envelope or payload is malformed.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A collaborator call failed on a path without a fallback.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// The checkout saga did not confirm the order.
    #[error("Checkout {status}: {reason}")]
    CheckoutFailed {
        status: String,
        reason: String,
        kind: ErrorKind,
        outcome: Box<CheckoutOutcome>,
    },

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Request handling panicked.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::Validation(_) => ErrorKind::Validation,
            OrchestratorError::Collaborator(e) => e.kind(),
            OrchestratorError::CheckoutFailed { kind, .. } => *kind,
            OrchestratorError::Serialization(_) | OrchestratorError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Data worth returning alongside the error, if any.
    pub fn data(&self) -> Option<serde_json::Value> {
        match self {
            OrchestratorError::CheckoutFailed { outcome, .. } => serde_json::to_value(outcome).ok(),
            _ => None,
        }
    }

    pub(crate) fn checkout_failed(outcome: CheckoutOutcome) -> Self {
        let status = outcome
            .status
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "rejected".to_string());
        let reason = if outcome.errors.is_empty() {
            "order was not confirmed".to_string()
        } else {
            outcome.errors.join("; ")
        };
        OrchestratorError::CheckoutFailed {
            status,
            reason,
            kind: outcome.error_kind.unwrap_or(ErrorKind::Internal),
            outcome: Box::new(outcome),
        }
    }
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
