//! Inventory service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::TransactionId;
use ledger::LineItem;

use crate::error::SagaError;

/// Result of a successful inventory reservation.
#[derive(Debug, Clone)]
pub struct ReservationResult {
    /// The reservation ID assigned by the inventory service.
    pub reservation_id: String,
}

/// Trait for inventory management operations.
///
/// `release` must be idempotent per reservation ID: releasing an already
/// released reservation succeeds without effect.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Reserves stock for the given items on behalf of a transaction.
    async fn reserve(
        &self,
        merchant_id: &str,
        transaction_id: TransactionId,
        items: &[LineItem],
    ) -> Result<ReservationResult, SagaError>;

    /// Releases a previously made reservation.
    async fn release(&self, reservation_id: &str) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    reservations: HashMap<String, (TransactionId, Vec<LineItem>)>,
    released: Vec<String>,
    next_id: u32,
    release_calls: u32,
    fail_on_reserve: bool,
    fail_on_release: bool,
    fail_next_releases: u32,
}

/// In-memory inventory service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryService {
    /// Creates a new in-memory inventory service.
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryInventoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryInventoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the service to fail every reserve call.
    pub fn set_fail_on_reserve(&self, fail: bool) {
        self.write().fail_on_reserve = fail;
    }

    /// Configures the service to fail every release call.
    pub fn set_fail_on_release(&self, fail: bool) {
        self.write().fail_on_release = fail;
    }

    /// Fails the next `count` release calls, then recovers.
    pub fn fail_next_releases(&self, count: u32) {
        self.write().fail_next_releases = count;
    }

    /// Returns the number of active reservations.
    pub fn reservation_count(&self) -> usize {
        self.read().reservations.len()
    }

    /// Returns true if a reservation exists with the given ID.
    pub fn has_reservation(&self, reservation_id: &str) -> bool {
        self.read().reservations.contains_key(reservation_id)
    }

    /// Returns how many times `release` was invoked, including failures.
    pub fn release_calls(&self) -> u32 {
        self.read().release_calls
    }

    /// Returns the reservation IDs actually released, in order.
    pub fn released(&self) -> Vec<String> {
        self.read().released.clone()
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn reserve(
        &self,
        _merchant_id: &str,
        transaction_id: TransactionId,
        items: &[LineItem],
    ) -> Result<ReservationResult, SagaError> {
        let mut state = self.write();

        if state.fail_on_reserve {
            return Err(SagaError::Inventory("Insufficient stock".to_string()));
        }

        state.next_id += 1;
        let reservation_id = format!("RES-{:04}", state.next_id);
        state
            .reservations
            .insert(reservation_id.clone(), (transaction_id, items.to_vec()));

        Ok(ReservationResult { reservation_id })
    }

    async fn release(&self, reservation_id: &str) -> Result<(), SagaError> {
        let mut state = self.write();
        state.release_calls += 1;

        if state.fail_next_releases > 0 {
            state.fail_next_releases -= 1;
            return Err(SagaError::Inventory("Inventory service unavailable".to_string()));
        }
        if state.fail_on_release {
            return Err(SagaError::Inventory("Inventory service unavailable".to_string()));
        }

        if state.reservations.remove(reservation_id).is_some() {
            state.released.push(reservation_id.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    fn items() -> Vec<LineItem> {
        vec![LineItem::new("SKU-001", "Widget", 2, Money::from_cents(1000))]
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let service = InMemoryInventoryService::new();

        let result = service
            .reserve("merchant-1", TransactionId::new(), &items())
            .await
            .unwrap();
        assert!(result.reservation_id.starts_with("RES-"));
        assert_eq!(service.reservation_count(), 1);
        assert!(service.has_reservation(&result.reservation_id));

        service.release(&result.reservation_id).await.unwrap();
        assert_eq!(service.reservation_count(), 0);
        assert_eq!(service.released(), vec![result.reservation_id]);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let service = InMemoryInventoryService::new();
        let result = service
            .reserve("merchant-1", TransactionId::new(), &items())
            .await
            .unwrap();

        service.release(&result.reservation_id).await.unwrap();
        service.release(&result.reservation_id).await.unwrap();

        assert_eq!(service.release_calls(), 2);
        assert_eq!(service.released().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_on_reserve() {
        let service = InMemoryInventoryService::new();
        service.set_fail_on_reserve(true);

        let result = service
            .reserve("merchant-1", TransactionId::new(), &items())
            .await;
        assert!(matches!(result, Err(SagaError::Inventory(_))));
        assert_eq!(service.reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_next_releases_recovers() {
        let service = InMemoryInventoryService::new();
        let result = service
            .reserve("merchant-1", TransactionId::new(), &items())
            .await
            .unwrap();
        service.fail_next_releases(1);

        assert!(service.release(&result.reservation_id).await.is_err());
        assert!(service.release(&result.reservation_id).await.is_ok());
        assert_eq!(service.reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_sequential_reservation_ids() {
        let service = InMemoryInventoryService::new();
        let id = TransactionId::new();

        let r1 = service.reserve("m", id, &[]).await.unwrap();
        let r2 = service.reserve("m", id, &[]).await.unwrap();

        assert_eq!(r1.reservation_id, "RES-0001");
        assert_eq!(r2.reservation_id, "RES-0002");
    }
}
