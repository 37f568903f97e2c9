//! Receipt service trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::TransactionId;
use ledger::Transaction;

use crate::error::SagaError;

/// Trait for requesting receipt generation for a confirmed order.
#[async_trait]
pub trait ReceiptService: Send + Sync {
    async fn request_receipt(&self, transaction: &Transaction) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryReceiptState {
    requested: Vec<TransactionId>,
    fail_on_request: bool,
}

/// In-memory receipt service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReceiptService {
    state: Arc<RwLock<InMemoryReceiptState>>,
}

impl InMemoryReceiptService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail every request.
    pub fn set_fail_on_request(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_request = fail;
    }

    /// Returns the number of receipts requested.
    pub fn receipt_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .requested
            .len()
    }
}

#[async_trait]
impl ReceiptService for InMemoryReceiptService {
    async fn request_receipt(&self, transaction: &Transaction) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_request {
            return Err(SagaError::Receipt("Renderer unavailable".to_string()));
        }

        state.requested.push(transaction.transaction_id);
        Ok(())
    }
}
