//! Checkout saga: forward steps.

use std::future::Future;

use ledger::{Transaction, TransactionId, TransactionStatus, TransactionStore, TransactionStoreExt};

use crate::config::SagaConfig;
use crate::error::SagaError;
use crate::events::CheckoutEvent;
use crate::request::{CheckoutOutcome, CheckoutRequest, StepLog};
use crate::services::{ChargeRequest, CheckoutServices};
use crate::steps;

/// Drives a checkout from request to a consistent terminal state.
///
/// Forward steps run strictly in order: create the transaction, reserve
/// inventory, charge payment, confirm the order. A failing step is not
/// retried in place; the saga moves straight to compensation, which reverses
/// the side effects recorded on the transaction. The transaction row is
/// persisted after every step so the retry sweep can pick up where a run
/// left off.
pub struct CheckoutSaga<S: TransactionStore> {
    pub(crate) store: S,
    pub(crate) services: CheckoutServices,
    pub(crate) config: SagaConfig,
}

impl<S: TransactionStore> CheckoutSaga<S> {
    /// Creates a new checkout saga.
    pub fn new(store: S, services: CheckoutServices, config: SagaConfig) -> Self {
        Self {
            store,
            services,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    /// Runs a checkout. Never fails: every error ends up in the outcome.
    #[tracing::instrument(
        skip(self, request),
        fields(merchant_id = %request.merchant_id, user_id = %request.user_id)
    )]
    pub async fn checkout(&self, request: CheckoutRequest) -> CheckoutOutcome {
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = std::time::Instant::now();

        let outcome = self.run_checkout(request).await;

        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);
        if outcome.is_confirmed() {
            metrics::counter!("saga_confirmed_total").increment(1);
        }
        outcome
    }

    /// Loads a transaction by ID.
    pub async fn get_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Transaction>, SagaError> {
        Ok(self.store.get(transaction_id).await?)
    }

    async fn run_checkout(&self, request: CheckoutRequest) -> CheckoutOutcome {
        // 1-2. Consent and totals; nothing is stored for a rejected request
        let total = match request.validate() {
            Ok(total) => total,
            Err(e) => {
                tracing::warn!(error = %e, "checkout rejected");
                return CheckoutOutcome::rejected(&e);
            }
        };

        let mut log = StepLog::default();
        let mut tx = Transaction::new(
            request.merchant_id,
            request.user_id,
            request.session_id,
            request.items,
            total,
            request.currency,
            request.payment_method,
        );
        let transaction_id = tx.transaction_id;

        // 3. Create the transaction row
        if let Err(e) = self.store.save(&mut tx).await {
            let e = SagaError::from(e);
            tracing::error!(%transaction_id, error = %e, "failed to create transaction");
            log.failed(steps::STEP_CREATE_TRANSACTION, &e);
            let mut outcome = CheckoutOutcome::from_transaction(&tx, log);
            outcome.status = None;
            return outcome;
        }
        log.completed(steps::STEP_CREATE_TRANSACTION);
        tracing::info!(%transaction_id, total = %tx.total_amount, "checkout started");

        // 4. Reserve inventory
        tracing::info!(step = steps::STEP_RESERVE_INVENTORY, "saga step started");
        if let Err(e) = self.reserve_inventory(&mut tx).await {
            return self.abort(tx, steps::STEP_RESERVE_INVENTORY, e, log).await;
        }
        log.completed(steps::STEP_RESERVE_INVENTORY);

        // 5. Charge payment
        tracing::info!(step = steps::STEP_PROCESS_PAYMENT, "saga step started");
        if let Err(e) = self.process_payment(&mut tx, request.payment_details).await {
            return self.abort(tx, steps::STEP_PROCESS_PAYMENT, e, log).await;
        }
        log.completed(steps::STEP_PROCESS_PAYMENT);

        // 6. Confirm the order
        tracing::info!(step = steps::STEP_CONFIRM_ORDER, "saga step started");
        if let Err(e) = self.confirm_order(&mut tx).await {
            return self.abort(tx, steps::STEP_CONFIRM_ORDER, e, log).await;
        }
        log.completed(steps::STEP_CONFIRM_ORDER);

        // Best-effort follow-ups; failures never roll back a confirmed order
        let order_reference = tx.order_reference.clone().unwrap_or_default();
        let event = CheckoutEvent::order_created(
            transaction_id,
            tx.merchant_id.clone(),
            tx.user_id.clone(),
            order_reference.clone(),
            tx.total_amount,
            tx.currency.clone(),
        );
        match self.publish(steps::STEP_PUBLISH_ORDER_CREATED, &event).await {
            Ok(()) => log.completed(steps::STEP_PUBLISH_ORDER_CREATED),
            Err(e) => {
                tracing::warn!(%transaction_id, error = %e, "order-created event not published");
                log.warn(steps::STEP_PUBLISH_ORDER_CREATED, &e);
            }
        }

        match self
            .bounded(
                steps::STEP_REQUEST_RECEIPT,
                self.services.receipts.request_receipt(&tx),
            )
            .await
        {
            Ok(()) => log.completed(steps::STEP_REQUEST_RECEIPT),
            Err(e) => {
                tracing::warn!(%transaction_id, error = %e, "receipt request failed");
                log.warn(steps::STEP_REQUEST_RECEIPT, &e);
            }
        }

        tracing::info!(%transaction_id, %order_reference, "checkout confirmed");
        CheckoutOutcome::from_transaction(&tx, log)
    }

    async fn reserve_inventory(&self, tx: &mut Transaction) -> Result<(), SagaError> {
        let result = self
            .bounded(
                steps::STEP_RESERVE_INVENTORY,
                self.services
                    .inventory
                    .reserve(&tx.merchant_id, tx.transaction_id, &tx.items),
            )
            .await?;

        tx.record_reservation(result.reservation_id)?;
        tx.transition_to(TransactionStatus::InventoryReserved)?;
        self.store.save(tx).await?;
        Ok(())
    }

    async fn process_payment(
        &self,
        tx: &mut Transaction,
        details: serde_json::Value,
    ) -> Result<(), SagaError> {
        let gateway = self.services.payments.gateway(tx.payment_method)?;
        let request = ChargeRequest {
            merchant_id: tx.merchant_id.clone(),
            transaction_id: tx.transaction_id,
            amount: tx.total_amount,
            currency: tx.currency.clone(),
            method: tx.payment_method,
            details,
        };
        let result = self
            .bounded(steps::STEP_PROCESS_PAYMENT, gateway.charge(request))
            .await?;

        tx.record_payment_intent(result.payment_intent_id)?;
        tx.transition_to(TransactionStatus::PaymentProcessed)?;
        self.store.save(tx).await?;
        Ok(())
    }

    /// Persists the order and the confirmed transaction. On failure `tx`
    /// is left in its pre-confirmation state for compensation.
    async fn confirm_order(&self, tx: &mut Transaction) -> Result<(), SagaError> {
        let confirmation = self
            .bounded(
                steps::STEP_CONFIRM_ORDER,
                self.services.orders.create_order(tx),
            )
            .await?;

        let mut confirmed = tx.clone();
        confirmed.order_reference = Some(confirmation.order_reference);
        confirmed.transition_to(TransactionStatus::Confirmed)?;
        self.store.save(&mut confirmed).await?;

        *tx = confirmed;
        Ok(())
    }

    /// Routes a forward-step failure into compensation.
    async fn abort(
        &self,
        tx: Transaction,
        step: &'static str,
        error: SagaError,
        mut log: StepLog,
    ) -> CheckoutOutcome {
        let transaction_id = tx.transaction_id;
        tracing::warn!(%transaction_id, step, error = %error, "saga step failed");
        log.failed(step, &error);

        let reason = format!("{step} failed: {error}");
        let tx = self.compensate(tx, &reason, &mut log).await;

        metrics::counter!("saga_compensations_total", "outcome" => tx.status().as_str())
            .increment(1);
        CheckoutOutcome::from_transaction(&tx, log)
    }

    /// Publishes a checkout event through the notification collaborator.
    pub(crate) async fn publish(
        &self,
        step: &'static str,
        event: &CheckoutEvent,
    ) -> Result<(), SagaError> {
        let payload = event.payload()?;
        self.bounded(
            step,
            self.services
                .notifications
                .publish(event.event_type(), payload),
        )
        .await
    }

    /// Bounds a collaborator call by the step timeout.
    pub(crate) async fn bounded<T>(
        &self,
        step: &'static str,
        call: impl Future<Output = Result<T, SagaError>>,
    ) -> Result<T, SagaError> {
        let after = self.config.step_timeout;
        tokio::time::timeout(after, call)
            .await
            .unwrap_or(Err(SagaError::StepTimeout { step, after }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Consent;
    use crate::services::InMemoryServices;
    use ledger::{CompensationType, InMemoryTransactionStore, LineItem, Money, PaymentMethod};

    fn setup() -> (CheckoutSaga<InMemoryTransactionStore>, InMemoryServices) {
        let (services, handles) = CheckoutServices::in_memory();
        let config = SagaConfig::default().with_retry_delay(std::time::Duration::from_millis(1));
        let saga = CheckoutSaga::new(InMemoryTransactionStore::new(), services, config);
        (saga, handles)
    }

    fn request() -> CheckoutRequest {
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
            payment_details: serde_json::Value::Null,
            consent: Consent::accepted(),
        }
    }

    #[tokio::test]
    async fn test_happy_path() {
        let (saga, handles) = setup();

        let outcome = saga.checkout(request()).await;

        assert!(outcome.is_confirmed(), "errors: {:?}", outcome.errors);
        assert_eq!(outcome.total_amount, Some(Money::from_cents(4998)));
        assert!(outcome.order_reference.is_some());
        assert!(outcome.errors.is_empty());
        assert_eq!(
            outcome.actions_executed,
            vec![
                steps::STEP_CREATE_TRANSACTION,
                steps::STEP_RESERVE_INVENTORY,
                steps::STEP_PROCESS_PAYMENT,
                steps::STEP_CONFIRM_ORDER,
                steps::STEP_PUBLISH_ORDER_CREATED,
                steps::STEP_REQUEST_RECEIPT,
            ]
        );

        let tx = saga
            .get_transaction(outcome.transaction_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status(), TransactionStatus::Confirmed);
        assert!(tx.inventory_reservation_id.is_some());
        assert!(tx.payment_intent_id.is_some());
        assert!(tx.compensation_actions.is_empty());

        assert_eq!(handles.inventory.reservation_count(), 1);
        assert_eq!(handles.payments.payment_count(), 1);
        assert_eq!(handles.orders.order_count(), 1);
        assert_eq!(handles.receipts.receipt_count(), 1);
        assert_eq!(
            handles.notifications.event_types(),
            vec![steps::EVENT_ORDER_CREATED]
        );
    }

    #[tokio::test]
    async fn test_validation_failure_creates_no_transaction() {
        let (saga, handles) = setup();
        let mut req = request();
        req.consent.terms_accepted = false;

        let outcome = saga.checkout(req).await;

        assert!(outcome.transaction_id.is_none());
        assert!(outcome.status.is_none());
        assert_eq!(outcome.error_kind, Some(common::ErrorKind::Validation));
        assert!(saga.store().is_empty().await);
        assert_eq!(handles.inventory.reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_inventory_failure_compensates_without_release() {
        let (saga, handles) = setup();
        handles.inventory.set_fail_on_reserve(true);

        let outcome = saga.checkout(request()).await;

        assert_eq!(outcome.status, Some(TransactionStatus::Compensated));
        assert_eq!(outcome.error_kind, Some(common::ErrorKind::Inventory));

        let tx = saga
            .get_transaction(outcome.transaction_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        let types: Vec<_> = tx
            .compensation_actions
            .iter()
            .map(|a| a.action_type)
            .collect();
        assert_eq!(
            types,
            vec![CompensationType::CancelOrder, CompensationType::Notify]
        );
        assert_eq!(handles.inventory.release_calls(), 0);
        assert_eq!(handles.payments.charge_calls(), 0);
    }

    #[tokio::test]
    async fn test_best_effort_failures_do_not_roll_back() {
        let (saga, handles) = setup();
        handles.receipts.set_fail_on_request(true);
        handles.notifications.set_fail_on_publish(true);

        let outcome = saga.checkout(request()).await;

        assert!(outcome.is_confirmed());
        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome.errors.is_empty());
        assert_eq!(handles.payments.payment_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_gateway_is_a_payment_failure() {
        let (services, handles) = CheckoutServices::in_memory();
        let services = CheckoutServices {
            payments: crate::services::PaymentRouter::new().with_gateway(
                PaymentMethod::Card,
                std::sync::Arc::new(handles.payments.clone()),
            ),
            ..services
        };
        let saga = CheckoutSaga::new(
            InMemoryTransactionStore::new(),
            services,
            SagaConfig::default(),
        );
        let mut req = request();
        req.payment_method = PaymentMethod::Paypal;

        let outcome = saga.checkout(req).await;

        assert_eq!(outcome.error_kind, Some(common::ErrorKind::Payment));
        assert_eq!(outcome.status, Some(TransactionStatus::Compensated));
        assert_eq!(handles.inventory.reservation_count(), 0);
    }
}
