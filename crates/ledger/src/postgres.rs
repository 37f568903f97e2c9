use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::store::{TransactionStore, is_open_compensation};
use crate::{LedgerError, Result, Transaction, TransactionId, TransactionStatus, Version};

/// PostgreSQL-backed transaction store.
///
/// The full record is stored as a JSONB document; `status` and `version`
/// are kept in their own columns so listing and compare-and-swap run in SQL.
#[derive(Clone)]
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    /// Creates a new PostgreSQL transaction store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_transaction(row: PgRow) -> Result<Transaction> {
        let document: serde_json::Value = row.try_get("document")?;
        let mut transaction: Transaction = serde_json::from_value(document)?;
        transaction.version = Version::new(row.try_get("version")?);
        Ok(transaction)
    }

    async fn current_version(&self, transaction_id: TransactionId) -> Result<Option<Version>> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM checkout_transactions WHERE transaction_id = $1",
        )
        .bind(transaction_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(version.map(Version::new))
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn get(&self, transaction_id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            "SELECT version, document FROM checkout_transactions WHERE transaction_id = $1",
        )
        .bind(transaction_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_transaction).transpose()
    }

    async fn put(&self, transaction: &Transaction) -> Result<Version> {
        let document = serde_json::to_value(transaction)?;

        let version: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO checkout_transactions
                (transaction_id, merchant_id, user_id, status, version, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 1, $5, $6, $7)
            ON CONFLICT (transaction_id) DO UPDATE SET
                status = EXCLUDED.status,
                version = checkout_transactions.version + 1,
                document = EXCLUDED.document,
                updated_at = EXCLUDED.updated_at
            RETURNING version
            "#,
        )
        .bind(transaction.transaction_id.as_uuid())
        .bind(&transaction.merchant_id)
        .bind(&transaction.user_id)
        .bind(transaction.status().as_str())
        .bind(document)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(Version::new(version))
    }

    async fn compare_and_swap(
        &self,
        transaction: &Transaction,
        expected: Version,
    ) -> Result<Version> {
        let transaction_id = transaction.transaction_id;
        let document = serde_json::to_value(transaction)?;

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE checkout_transactions
            SET status = $2, document = $3, updated_at = $4, version = version + 1
            WHERE transaction_id = $1 AND version = $5
            RETURNING version
            "#,
        )
        .bind(transaction_id.as_uuid())
        .bind(transaction.status().as_str())
        .bind(document)
        .bind(transaction.updated_at)
        .bind(expected.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(version) = updated {
            return Ok(Version::new(version));
        }

        match self.current_version(transaction_id).await? {
            Some(actual) => {
                tracing::warn!(%transaction_id, %expected, %actual, "Ledger version conflict");
                metrics::counter!("ledger_concurrency_conflicts_total").increment(1);
                Err(LedgerError::ConcurrencyConflict {
                    transaction_id,
                    expected,
                    actual,
                })
            }
            None => Err(LedgerError::TransactionNotFound(transaction_id)),
        }
    }

    async fn list_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT version, document FROM checkout_transactions
            WHERE status = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_transaction).collect()
    }

    async fn list_open_compensations(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT version, document FROM checkout_transactions
            WHERE status = $1 OR (status = $2 AND updated_at <= $3)
            ORDER BY created_at ASC
            "#,
        )
        .bind(TransactionStatus::Failed.as_str())
        .bind(TransactionStatus::Compensating.as_str())
        .bind(stale_before)
        .fetch_all(&self.pool)
        .await?;

        let mut open = Vec::new();
        for row in rows {
            let transaction = Self::row_to_transaction(row)?;
            if is_open_compensation(&transaction, stale_before) {
                open.push(transaction);
            }
        }
        Ok(open)
    }
}
