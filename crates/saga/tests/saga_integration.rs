//! Integration tests for the checkout saga.

use std::sync::Arc;
use std::time::Duration;

use ledger::{
    CompensationStatus, CompensationType, InMemoryTransactionStore, LineItem, Money,
    PaymentMethod, Transaction, TransactionId, TransactionStatus, TransactionStore,
};
use saga::{
    CheckoutOutcome, CheckoutRequest, CheckoutSaga, CheckoutServices, CompensationSweeper,
    Consent, InMemoryServices, SagaConfig, SagaError, steps,
};

type TestSaga = CheckoutSaga<InMemoryTransactionStore>;

struct TestHarness {
    saga: Arc<TestSaga>,
    services: InMemoryServices,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(SagaConfig::default())
    }

    fn with_config(config: SagaConfig) -> Self {
        let (services, handles) = CheckoutServices::in_memory();
        let config = config.with_retry_delay(Duration::from_millis(1));
        let saga = Arc::new(CheckoutSaga::new(
            InMemoryTransactionStore::new(),
            services,
            config,
        ));
        Self {
            saga,
            services: handles,
        }
    }

    /// Two items totalling $49.98.
    fn checkout_request(&self) -> CheckoutRequest {
        CheckoutRequest {
            merchant_id: "merchant-1".to_string(),
            user_id: "user-1".to_string(),
            session_id: Some("session-1".to_string()),
            items: vec![
                LineItem::new("SKU-001", "Widget", 1, Money::from_cents(1999)),
                LineItem::new("SKU-002", "Gadget", 1, Money::from_cents(2999)),
            ],
            currency: "USD".to_string(),
            payment_method: PaymentMethod::Card,
            payment_details: serde_json::json!({"token": "tok_visa"}),
            consent: Consent::accepted(),
        }
    }

    async fn checkout(&self) -> CheckoutOutcome {
        self.saga.checkout(self.checkout_request()).await
    }

    async fn transaction(&self, outcome: &CheckoutOutcome) -> Transaction {
        let id = outcome.transaction_id.expect("transaction created");
        self.saga
            .get_transaction(id)
            .await
            .unwrap()
            .expect("transaction stored")
    }
}

fn count_actions(tx: &Transaction, action_type: CompensationType) -> usize {
    tx.compensation_actions
        .iter()
        .filter(|a| a.action_type == action_type)
        .count()
}

// ============================================================================
// Forward path
// ============================================================================

#[tokio::test]
async fn checkout_confirms_order() {
    let h = TestHarness::new();

    let outcome = h.checkout().await;

    assert!(outcome.is_confirmed());
    assert_eq!(outcome.total_amount, Some(Money::from_cents(4998)));
    let tx = h.transaction(&outcome).await;
    assert_eq!(tx.status(), TransactionStatus::Confirmed);
    assert_eq!(tx.order_reference, outcome.order_reference);
    assert_eq!(h.services.payments.payment_count(), 1);
    assert_eq!(h.services.inventory.reservation_count(), 1);
}

#[tokio::test]
async fn concurrent_checkouts_are_independent() {
    let h = TestHarness::new();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let saga = h.saga.clone();
        let request = h.checkout_request();
        tasks.push(tokio::spawn(async move { saga.checkout(request).await }));
    }

    let mut ids = std::collections::HashSet::new();
    for task in tasks {
        let outcome = task.await.unwrap();
        assert!(outcome.is_confirmed());
        ids.insert(outcome.transaction_id.unwrap());
    }

    assert_eq!(ids.len(), 20);
    assert_eq!(h.services.orders.order_count(), 20);
    let confirmed = h
        .saga
        .store()
        .list_by_status(TransactionStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 20);
}

// ============================================================================
// Scenario A: payment fails after reservation
// ============================================================================

#[tokio::test]
async fn payment_failure_releases_inventory_only() {
    let h = TestHarness::new();
    h.services.payments.set_fail_on_charge(true);

    let outcome = h.checkout().await;

    assert_eq!(outcome.status, Some(TransactionStatus::Compensated));
    assert_eq!(outcome.error_kind, Some(common::ErrorKind::Payment));

    let tx = h.transaction(&outcome).await;
    assert_eq!(count_actions(&tx, CompensationType::ReleaseInventory), 1);
    assert_eq!(count_actions(&tx, CompensationType::RefundPayment), 0);
    assert!(tx.payment_intent_id.is_none());
    assert!(
        tx.compensation_actions
            .iter()
            .all(|a| a.status == CompensationStatus::Completed)
    );

    let reservation_id = tx.inventory_reservation_id.clone().unwrap();
    assert_eq!(h.services.inventory.released(), vec![reservation_id]);
    assert_eq!(h.services.payments.refund_calls(), 0);
    assert!(h.services.orders.is_cancelled(tx.transaction_id));
    assert!(
        h.services
            .notifications
            .event_types()
            .contains(&steps::EVENT_CHECKOUT_CANCELLED.to_string())
    );
}

#[tokio::test]
async fn payment_failure_with_failing_release_ends_failed() {
    let h = TestHarness::new();
    h.services.payments.set_fail_on_charge(true);
    h.services.inventory.set_fail_on_release(true);

    let outcome = h.checkout().await;

    assert_eq!(outcome.status, Some(TransactionStatus::Failed));
    let tx = h.transaction(&outcome).await;
    let release = tx.compensation(CompensationType::ReleaseInventory).unwrap();
    assert_eq!(release.status, CompensationStatus::Failed);
    assert_eq!(
        tx.compensation(CompensationType::CancelOrder).unwrap().status,
        CompensationStatus::Completed
    );
    assert_eq!(
        tx.compensation(CompensationType::Notify).unwrap().status,
        CompensationStatus::Completed
    );
}

// ============================================================================
// Scenario B: order confirmation fails after payment
// ============================================================================

#[tokio::test]
async fn confirmation_failure_refunds_and_releases() {
    let h = TestHarness::new();
    h.services.orders.set_fail_on_create(true);

    let outcome = h.checkout().await;

    assert_eq!(outcome.status, Some(TransactionStatus::Compensated));
    let tx = h.transaction(&outcome).await;
    let types: Vec<_> = tx
        .compensation_actions
        .iter()
        .map(|a| a.action_type)
        .collect();
    assert_eq!(
        types,
        vec![
            CompensationType::RefundPayment,
            CompensationType::ReleaseInventory,
            CompensationType::CancelOrder,
            CompensationType::Notify,
        ]
    );

    let payment_intent_id = tx.payment_intent_id.clone().unwrap();
    assert!(h.services.payments.is_refunded(&payment_intent_id));
    assert_eq!(h.services.inventory.reservation_count(), 0);
    assert!(tx.order_reference.is_none());
    assert_eq!(
        outcome.actions_executed,
        vec![
            steps::STEP_CREATE_TRANSACTION,
            steps::STEP_RESERVE_INVENTORY,
            steps::STEP_PROCESS_PAYMENT,
            steps::STEP_REFUND_PAYMENT,
            steps::STEP_RELEASE_INVENTORY,
            steps::STEP_CANCEL_ORDER,
            steps::STEP_NOTIFY,
        ]
    );
}

// ============================================================================
// Idempotency and retry bounds
// ============================================================================

#[tokio::test]
async fn compensation_retries_exactly_max_retries_times() {
    let h = TestHarness::with_config(SagaConfig::default().with_max_retries(3));
    h.services.payments.set_fail_on_charge(true);
    h.services.inventory.set_fail_on_release(true);

    let outcome = h.checkout().await;

    let tx = h.transaction(&outcome).await;
    let release = tx.compensation(CompensationType::ReleaseInventory).unwrap();
    assert_eq!(release.status, CompensationStatus::Failed);
    assert_eq!(release.retry_count, 3);
    assert_eq!(h.services.inventory.release_calls(), 3);
}

#[tokio::test]
async fn compensation_recovers_within_retries() {
    let h = TestHarness::new();
    h.services.payments.set_fail_on_charge(true);
    h.services.inventory.fail_next_releases(2);

    let outcome = h.checkout().await;

    assert_eq!(outcome.status, Some(TransactionStatus::Compensated));
    let tx = h.transaction(&outcome).await;
    let release = tx.compensation(CompensationType::ReleaseInventory).unwrap();
    assert_eq!(release.retry_count, 2);
    assert_eq!(release.status, CompensationStatus::Completed);
    assert_eq!(h.services.inventory.release_calls(), 3);
}

#[tokio::test]
async fn reinvoking_compensation_schedules_nothing_new() {
    let h = TestHarness::new();
    h.services.payments.set_fail_on_charge(true);
    h.services.inventory.set_fail_on_release(true);

    let outcome = h.checkout().await;
    let id = outcome.transaction_id.unwrap();
    let calls_before = h.services.inventory.release_calls();

    let report = h
        .saga
        .execute_compensation(id, "manual retry")
        .await
        .unwrap();

    assert_eq!(report.status, TransactionStatus::Failed);
    assert!(report.actions_executed.is_empty());
    let tx = h.transaction(&outcome).await;
    assert_eq!(count_actions(&tx, CompensationType::ReleaseInventory), 1);
    assert_eq!(tx.compensation_actions.len(), 3);
    assert_eq!(h.services.inventory.release_calls(), calls_before);
}

#[tokio::test]
async fn compensating_a_compensated_transaction_is_a_no_op() {
    let h = TestHarness::new();
    h.services.payments.set_fail_on_charge(true);
    let outcome = h.checkout().await;
    let id = outcome.transaction_id.unwrap();

    let report = h.saga.execute_compensation(id, "again").await.unwrap();

    assert_eq!(report.status, TransactionStatus::Compensated);
    assert!(report.actions_executed.is_empty());
    assert_eq!(h.services.inventory.release_calls(), 1);
}

#[tokio::test]
async fn confirmed_transactions_cannot_be_compensated() {
    let h = TestHarness::new();
    let outcome = h.checkout().await;

    let result = h
        .saga
        .execute_compensation(outcome.transaction_id.unwrap(), "refund request")
        .await;

    assert!(matches!(result, Err(SagaError::InvalidState { .. })));
}

#[tokio::test]
async fn unknown_transaction_cannot_be_compensated() {
    let h = TestHarness::new();
    let result = h
        .saga
        .execute_compensation(TransactionId::new(), "test")
        .await;
    assert!(matches!(result, Err(SagaError::Ledger(_))));
}

#[tokio::test]
async fn stuck_reservation_is_released_by_explicit_compensation() {
    let h = TestHarness::new();
    let mut tx = Transaction::new(
        "merchant-1",
        "user-1",
        None,
        vec![LineItem::new("SKU-001", "Widget", 1, Money::from_cents(500))],
        Money::from_cents(500),
        "USD",
        PaymentMethod::Card,
    );
    tx.record_reservation("RES-STUCK").unwrap();
    tx.transition_to(TransactionStatus::InventoryReserved).unwrap();
    h.saga.store().put(&tx).await.unwrap();

    let report = h
        .saga
        .execute_compensation(tx.transaction_id, "process restarted")
        .await
        .unwrap();

    assert_eq!(report.status, TransactionStatus::Compensated);
    assert_eq!(h.services.inventory.release_calls(), 1);
}

// ============================================================================
// Retry sweep
// ============================================================================

#[tokio::test]
async fn sweep_completes_failed_compensations() {
    let h = TestHarness::new();
    h.services.payments.set_fail_on_charge(true);
    h.services.inventory.set_fail_on_release(true);
    let outcome = h.checkout().await;
    assert_eq!(outcome.status, Some(TransactionStatus::Failed));

    h.services.inventory.set_fail_on_release(false);
    let report = h.saga.retry_failed_compensations().await.unwrap();

    assert_eq!(report.transactions_scanned, 1);
    assert_eq!(report.actions_attempted, 1);
    assert_eq!(report.actions_completed, 1);
    assert_eq!(report.transactions_compensated, 1);

    let tx = h.transaction(&outcome).await;
    assert_eq!(tx.status(), TransactionStatus::Compensated);
    assert_eq!(h.services.inventory.reservation_count(), 0);

    let second = h.saga.retry_failed_compensations().await.unwrap();
    assert_eq!(second.transactions_scanned, 0);
}

#[tokio::test]
async fn sweep_alerts_once_when_attempts_exhausted() {
    let h = TestHarness::with_config(SagaConfig::default().with_max_sweep_attempts(2));
    h.services.payments.set_fail_on_charge(true);
    h.services.inventory.set_fail_on_release(true);
    let outcome = h.checkout().await;

    let first = h.saga.retry_failed_compensations().await.unwrap();
    let second = h.saga.retry_failed_compensations().await.unwrap();
    let third = h.saga.retry_failed_compensations().await.unwrap();

    assert_eq!(first.alerts_raised, 0);
    assert_eq!(second.alerts_raised, 1);
    assert_eq!(third.actions_attempted, 0);
    assert_eq!(third.alerts_raised, 0);

    let alerts = h.services.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].action_type, CompensationType::ReleaseInventory);
    assert_eq!(alerts[0].transaction_id, outcome.transaction_id.unwrap());

    let tx = h.transaction(&outcome).await;
    let release = tx.compensation(CompensationType::ReleaseInventory).unwrap();
    assert_eq!(release.sweep_attempts, 2);
    assert!(release.alerted);
    assert_eq!(tx.status(), TransactionStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn background_sweeper_retries_failed_compensations() {
    let h = TestHarness::new();
    h.services.payments.set_fail_on_charge(true);
    h.services.inventory.set_fail_on_release(true);
    let outcome = h.checkout().await;
    assert_eq!(outcome.status, Some(TransactionStatus::Failed));

    h.services.inventory.set_fail_on_release(false);
    let sweeper = CompensationSweeper::spawn(h.saga.clone(), Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(61)).await;

    let tx = h.transaction(&outcome).await;
    assert_eq!(tx.status(), TransactionStatus::Compensated);

    sweeper.shutdown().await;
}

/// A harness whose saga waits 200ms between compensation attempts.
fn slow_retry_harness(stale_compensation_after: Duration) -> TestHarness {
    let (services, handles) = CheckoutServices::in_memory();
    let config = SagaConfig::default()
        .with_retry_delay(Duration::from_millis(200))
        .with_stale_compensation_after(stale_compensation_after);
    TestHarness {
        saga: Arc::new(CheckoutSaga::new(
            InMemoryTransactionStore::new(),
            services,
            config,
        )),
        services: handles,
    }
}

fn cancelled_events(h: &TestHarness) -> usize {
    h.services
        .notifications
        .event_types()
        .iter()
        .filter(|t| t.as_str() == "checkout.cancelled")
        .count()
}

#[tokio::test(start_paused = true)]
async fn sweep_leaves_running_compensation_alone() {
    let h = slow_retry_harness(Duration::from_secs(300));
    h.services.payments.set_fail_on_charge(true);
    h.services.inventory.fail_next_releases(1);

    let saga = h.saga.clone();
    let request = h.checkout_request();
    let checkout = tokio::spawn(async move { saga.checkout(request).await });

    // The saga is now waiting to retry the release.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = h.saga.retry_failed_compensations().await.unwrap();
    assert_eq!(report.transactions_scanned, 0);
    assert_eq!(report.actions_attempted, 0);

    let outcome = checkout.await.unwrap();
    assert_eq!(outcome.status, Some(TransactionStatus::Compensated));
    assert!(outcome.errors.iter().all(|e| !e.starts_with("persist")));
    assert_eq!(h.services.inventory.release_calls(), 2);
    assert_eq!(h.services.inventory.released().len(), 1);
    assert_eq!(h.services.orders.cancel_calls(), 1);
    assert_eq!(cancelled_events(&h), 1);
}

#[tokio::test(start_paused = true)]
async fn saga_stops_when_sweep_takes_over_stale_compensation() {
    let h = slow_retry_harness(Duration::ZERO);
    h.services.payments.set_fail_on_charge(true);
    h.services.inventory.fail_next_releases(1);

    let saga = h.saga.clone();
    let request = h.checkout_request();
    let checkout = tokio::spawn(async move { saga.checkout(request).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = h.saga.retry_failed_compensations().await.unwrap();
    assert_eq!(report.transactions_scanned, 1);
    assert_eq!(report.transactions_compensated, 1);

    let outcome = checkout.await.unwrap();
    assert_eq!(outcome.status, Some(TransactionStatus::Compensated));
    assert!(outcome.errors.iter().any(|e| e.contains("Concurrency conflict")));

    // The saga's late retry hits an already released reservation, and it
    // runs no further actions once it loses the record.
    assert_eq!(h.services.inventory.released().len(), 1);
    assert_eq!(h.services.orders.cancel_calls(), 1);
    assert_eq!(cancelled_events(&h), 1);

    let tx = h.transaction(&outcome).await;
    assert_eq!(tx.status(), TransactionStatus::Compensated);
}

#[tokio::test(start_paused = true)]
async fn background_sweeper_runs_alongside_live_compensation() {
    let h = slow_retry_harness(Duration::from_secs(300));
    h.services.payments.set_fail_on_charge(true);
    h.services.inventory.fail_next_releases(2);

    let sweeper = CompensationSweeper::spawn(h.saga.clone(), Duration::from_millis(100));
    let outcome = h.checkout().await;
    sweeper.shutdown().await;

    assert_eq!(outcome.status, Some(TransactionStatus::Compensated));
    assert_eq!(h.services.inventory.release_calls(), 3);
    assert_eq!(h.services.inventory.released().len(), 1);
    assert_eq!(h.services.orders.cancel_calls(), 1);
    assert_eq!(cancelled_events(&h), 1);
}
