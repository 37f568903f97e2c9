//! Order service trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::TransactionId;
use ledger::Transaction;

use crate::error::SagaError;

/// Result of persisting a confirmed order.
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    /// The merchant-facing order reference.
    pub order_reference: String,
}

/// Trait for order persistence operations.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Persists the order for a paid transaction and returns its reference.
    async fn create_order(&self, transaction: &Transaction)
    -> Result<OrderConfirmation, SagaError>;

    /// Cancels whatever order state exists for the transaction.
    ///
    /// Succeeds when no order was ever created.
    async fn cancel_order(&self, transaction_id: TransactionId, reason: &str)
    -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<TransactionId, String>,
    cancelled: HashSet<TransactionId>,
    next_id: u32,
    cancel_calls: u32,
    fail_on_create: bool,
    fail_on_cancel: bool,
}

/// In-memory order service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderService {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderService {
    /// Creates a new in-memory order service.
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryOrderState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryOrderState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the service to fail every create_order call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.write().fail_on_create = fail;
    }

    /// Configures the service to fail every cancel_order call.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.write().fail_on_cancel = fail;
    }

    /// Returns the number of persisted orders.
    pub fn order_count(&self) -> usize {
        self.read().orders.len()
    }

    /// Returns true if the transaction's order was cancelled.
    pub fn is_cancelled(&self, transaction_id: TransactionId) -> bool {
        self.read().cancelled.contains(&transaction_id)
    }

    pub fn cancel_calls(&self) -> u32 {
        self.read().cancel_calls
    }
}

#[async_trait]
impl OrderService for InMemoryOrderService {
    async fn create_order(
        &self,
        transaction: &Transaction,
    ) -> Result<OrderConfirmation, SagaError> {
        let mut state = self.write();

        if state.fail_on_create {
            return Err(SagaError::Order("Order database unavailable".to_string()));
        }

        if let Some(existing) = state.orders.get(&transaction.transaction_id) {
            return Ok(OrderConfirmation {
                order_reference: existing.clone(),
            });
        }

        state.next_id += 1;
        let order_reference = format!("ORD-{:06}", state.next_id);
        state
            .orders
            .insert(transaction.transaction_id, order_reference.clone());

        Ok(OrderConfirmation { order_reference })
    }

    async fn cancel_order(
        &self,
        transaction_id: TransactionId,
        _reason: &str,
    ) -> Result<(), SagaError> {
        let mut state = self.write();
        state.cancel_calls += 1;

        if state.fail_on_cancel {
            return Err(SagaError::Order("Order database unavailable".to_string()));
        }

        state.orders.remove(&transaction_id);
        state.cancelled.insert(transaction_id);
        Ok(())
    }
}
