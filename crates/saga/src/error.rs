//! Saga error types.

use std::time::Duration;

use common::{ErrorKind, TransactionId};
use ledger::{LedgerError, PaymentMethod, TransactionStatus};
use thiserror::Error;

use crate::steps;

/// Errors that can occur during checkout and compensation.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The checkout request was rejected before any side effect.
    #[error("Invalid checkout request: {0}")]
    Validation(String),

    /// Inventory service error.
    #[error("Inventory service error: {0}")]
    Inventory(String),

    /// Payment gateway error.
    #[error("Payment service error: {0}")]
    Payment(String),

    /// No gateway is registered for the selected payment method.
    #[error("No payment gateway configured for {0}")]
    NoGateway(PaymentMethod),

    /// Order service error.
    #[error("Order service error: {0}")]
    Order(String),

    /// Notification service error.
    #[error("Notification service error: {0}")]
    Notification(String),

    /// Receipt service error.
    #[error("Receipt service error: {0}")]
    Receipt(String),

    /// Alert sink error.
    #[error("Alert sink error: {0}")]
    Alert(String),

    /// A collaborator call exceeded the step timeout.
    #[error("Step '{step}' timed out after {after:?}")]
    StepTimeout { step: &'static str, after: Duration },

    /// The transaction is not in a state that allows the operation.
    #[error("Transaction {transaction_id} is {status}")]
    InvalidState {
        transaction_id: TransactionId,
        status: TransactionStatus,
    },

    /// Ledger error.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::Validation(_) | SagaError::InvalidState { .. } => ErrorKind::Validation,
            SagaError::Inventory(_) => ErrorKind::Inventory,
            SagaError::Payment(_) | SagaError::NoGateway(_) => ErrorKind::Payment,
            SagaError::Order(_)
            | SagaError::Notification(_)
            | SagaError::Receipt(_)
            | SagaError::Alert(_) => ErrorKind::Dependency,
            SagaError::StepTimeout { step, .. } => match *step {
                steps::STEP_RESERVE_INVENTORY | steps::STEP_RELEASE_INVENTORY => {
                    ErrorKind::Inventory
                }
                steps::STEP_PROCESS_PAYMENT | steps::STEP_REFUND_PAYMENT => ErrorKind::Payment,
                _ => ErrorKind::Dependency,
            },
            SagaError::Ledger(e) => e.kind(),
            SagaError::Serialization(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
