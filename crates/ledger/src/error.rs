use common::ErrorKind;
use thiserror::Error;

use crate::{TransactionId, TransactionStatus, Version};

/// Errors raised by the ledger model and its stores.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A compare-and-swap found a different version than expected.
    #[error(
        "Concurrency conflict for transaction {transaction_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        transaction_id: TransactionId,
        expected: Version,
        actual: Version,
    },

    /// The transaction does not exist.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// The requested status change is not part of the saga state machine.
    #[error("Invalid transaction status transition from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// A side-effect handle was recorded twice in the same saga run.
    #[error("{handle} already recorded for transaction {transaction_id}")]
    HandleAlreadyRecorded {
        transaction_id: TransactionId,
        handle: &'static str,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::ConcurrencyConflict { .. }
            | LedgerError::TransactionNotFound(_)
            | LedgerError::Database(_)
            | LedgerError::Migration(_)
            | LedgerError::Serialization(_) => ErrorKind::Persistence,
            LedgerError::InvalidTransition { .. } | LedgerError::HandleAlreadyRecorded { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
