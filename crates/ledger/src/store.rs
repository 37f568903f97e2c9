use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{LedgerError, Result, Transaction, TransactionId, TransactionStatus, Version};

/// Durable home of checkout transactions, keyed by transaction ID.
///
/// Only the saga instance that created a transaction writes to it, so
/// `put` is last-writer-wins; `compare_and_swap` lets that owner detect a
/// lost update anyway. All implementations must be thread-safe.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Loads a transaction. The returned record carries the stored version.
    async fn get(&self, transaction_id: TransactionId) -> Result<Option<Transaction>>;

    /// Inserts or overwrites a transaction and returns its new version.
    async fn put(&self, transaction: &Transaction) -> Result<Version>;

    /// Overwrites a transaction only if the stored version equals `expected`.
    ///
    /// Fails with `ConcurrencyConflict` on a version mismatch and with
    /// `TransactionNotFound` if nothing is stored under the ID.
    async fn compare_and_swap(&self, transaction: &Transaction, expected: Version)
    -> Result<Version>;

    /// Returns all transactions currently in `status`, oldest first.
    async fn list_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>>;

    /// Returns transactions with pending or failed compensation actions
    /// that no saga run is still working on, oldest first: every `failed`
    /// one, and `compensating` ones last updated at or before
    /// `stale_before`.
    async fn list_open_compensations(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;
}

/// Extension trait providing convenience methods for transaction stores.
#[async_trait]
pub trait TransactionStoreExt: TransactionStore {
    /// Loads a transaction or fails with `TransactionNotFound`.
    async fn require(&self, transaction_id: TransactionId) -> Result<Transaction> {
        self.get(transaction_id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(transaction_id))
    }

    /// Writes `transaction` against its own version and stores the new
    /// version back into it. Unsaved records are inserted with `put`.
    async fn save(&self, transaction: &mut Transaction) -> Result<Version> {
        let version = if !transaction.version.is_stored() {
            self.put(transaction).await?
        } else {
            self.compare_and_swap(transaction, transaction.version)
                .await?
        };
        transaction.version = version;
        Ok(version)
    }
}

// Blanket implementation for all TransactionStore implementations
impl<T: TransactionStore + ?Sized> TransactionStoreExt for T {}

pub(crate) fn is_open_compensation(transaction: &Transaction, stale_before: DateTime<Utc>) -> bool {
    let abandoned = match transaction.status() {
        TransactionStatus::Failed => true,
        TransactionStatus::Compensating => transaction.updated_at <= stale_before,
        TransactionStatus::Pending
        | TransactionStatus::InventoryReserved
        | TransactionStatus::PaymentProcessed
        | TransactionStatus::Confirmed
        | TransactionStatus::Compensated => false,
    };
    abandoned && transaction.has_open_compensations()
}
