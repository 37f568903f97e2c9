//! Transaction status state machine.

use serde::{Deserialize, Serialize};

/// The status of a checkout transaction.
///
/// State transitions:
/// ```text
/// Pending ──► InventoryReserved ──► PaymentProcessed ──► Confirmed
///    │                │                    │
///    └────────────────┴────────────────────┴──► Compensating ──┬──► Compensated
///                                                   ▲          └──► Failed
///                                                   └───────────────────┘
/// ```
///
/// A `Failed` transaction can still reach `Compensated` when the retry sweep
/// completes its remaining compensation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Transaction row created, no side effects yet.
    #[default]
    Pending,

    /// Inventory has been reserved.
    InventoryReserved,

    /// Payment has been charged.
    PaymentProcessed,

    /// Order persisted and confirmed (terminal state).
    Confirmed,

    /// A step failed and compensation is running.
    Compensating,

    /// Every scheduled compensation completed (terminal state).
    Compensated,

    /// At least one compensation exhausted its retries (terminal for the saga,
    /// open for the retry sweep).
    Failed,
}

impl TransactionStatus {
    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;

        match self {
            Pending => matches!(next, InventoryReserved | Compensating),
            InventoryReserved => matches!(next, PaymentProcessed | Compensating),
            PaymentProcessed => matches!(next, Confirmed | Compensating),
            Confirmed => false,
            Compensating => matches!(next, Compensated | Failed),
            Compensated => false,
            Failed => matches!(next, Compensating | Compensated),
        }
    }

    /// Returns true if compensation can be started from this status.
    pub fn can_compensate(&self) -> bool {
        self.can_transition_to(TransactionStatus::Compensating)
    }

    /// Returns true if this is a terminal state for the saga itself.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Confirmed | TransactionStatus::Compensated | TransactionStatus::Failed
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::InventoryReserved => "inventory_reserved",
            TransactionStatus::PaymentProcessed => "payment_processed",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Compensating => "compensating",
            TransactionStatus::Compensated => "compensated",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
