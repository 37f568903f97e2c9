use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::store::{TransactionStore, is_open_compensation};
use crate::{LedgerError, Result, Transaction, TransactionId, TransactionStatus, Version};

/// In-memory transaction store.
///
/// Same semantics as the PostgreSQL implementation; used in tests and when
/// no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<HashMap<TransactionId, Transaction>>>,
}

impl InMemoryTransactionStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored transactions.
    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transactions.read().await.is_empty()
    }

    fn sorted(mut transactions: Vec<Transaction>) -> Vec<Transaction> {
        transactions.sort_by_key(|t| t.created_at);
        transactions
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn get(&self, transaction_id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self.transactions.read().await.get(&transaction_id).cloned())
    }

    async fn put(&self, transaction: &Transaction) -> Result<Version> {
        let mut store = self.transactions.write().await;
        let next = store
            .get(&transaction.transaction_id)
            .map(|current| current.version.next())
            .unwrap_or_else(Version::first);

        let mut stored = transaction.clone();
        stored.version = next;
        store.insert(stored.transaction_id, stored);
        Ok(next)
    }

    async fn compare_and_swap(
        &self,
        transaction: &Transaction,
        expected: Version,
    ) -> Result<Version> {
        let mut store = self.transactions.write().await;
        let transaction_id = transaction.transaction_id;
        let current = store
            .get(&transaction_id)
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;

        if current.version != expected {
            tracing::warn!(
                %transaction_id,
                %expected,
                actual = %current.version,
                "Ledger version conflict"
            );
            metrics::counter!("ledger_concurrency_conflicts_total").increment(1);
            return Err(LedgerError::ConcurrencyConflict {
                transaction_id,
                expected,
                actual: current.version,
            });
        }

        let next = expected.next();
        let mut stored = transaction.clone();
        stored.version = next;
        store.insert(transaction_id, stored);
        Ok(next)
    }

    async fn list_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>> {
        let store = self.transactions.read().await;
        Ok(Self::sorted(
            store
                .values()
                .filter(|t| t.status() == status)
                .cloned()
                .collect(),
        ))
    }

    async fn list_open_compensations(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let store = self.transactions.read().await;
        Ok(Self::sorted(
            store
                .values()
                .filter(|t| is_open_compensation(t, stale_before))
                .cloned()
                .collect(),
        ))
    }
}
