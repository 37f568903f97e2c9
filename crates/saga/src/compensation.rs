//! Checkout saga: compensation and the retry sweep.

use chrono::{DateTime, TimeDelta, Utc};
use ledger::{
    CompensationStatus, CompensationType, LedgerError, Transaction, TransactionId,
    TransactionStatus, TransactionStore, TransactionStoreExt,
};

use crate::coordinator::CheckoutSaga;
use crate::error::SagaError;
use crate::events::CheckoutEvent;
use crate::request::{CompensationReport, StepLog, SweepReport};
use crate::services::{OperationalAlert, RefundRequest};
use crate::steps;

impl<S: TransactionStore> CheckoutSaga<S> {
    /// Compensates a stored transaction.
    ///
    /// Schedules a reversal for every side effect recorded on the transaction
    /// plus `cancel_order` and `notify`, then executes the pending ones.
    /// Calling this again never schedules a second action of the same type,
    /// and actions that already exhausted their retries are left to
    /// [`retry_failed_compensations`](Self::retry_failed_compensations).
    #[tracing::instrument(skip(self))]
    pub async fn execute_compensation(
        &self,
        transaction_id: TransactionId,
        reason: &str,
    ) -> Result<CompensationReport, SagaError> {
        let tx = self.store.require(transaction_id).await?;

        match tx.status() {
            TransactionStatus::Compensated => {
                return Ok(CompensationReport {
                    transaction_id,
                    status: tx.status(),
                    actions_executed: Vec::new(),
                    errors: Vec::new(),
                });
            }
            TransactionStatus::Confirmed => {
                return Err(SagaError::InvalidState {
                    transaction_id,
                    status: tx.status(),
                });
            }
            TransactionStatus::Pending
            | TransactionStatus::InventoryReserved
            | TransactionStatus::PaymentProcessed
            | TransactionStatus::Compensating
            | TransactionStatus::Failed => {}
        }

        let mut log = StepLog::default();
        let tx = self.compensate(tx, reason, &mut log).await;
        metrics::counter!("saga_compensations_total", "outcome" => tx.status().as_str())
            .increment(1);

        Ok(CompensationReport {
            transaction_id,
            status: tx.status(),
            actions_executed: log.actions,
            errors: log.errors,
        })
    }

    /// Moves `tx` into compensation and runs its pending actions.
    ///
    /// Returns the transaction in its final state. Ledger failures are
    /// logged and recorded in `log`. If another writer updated the record
    /// meanwhile, the run stops and returns the stored copy.
    pub(crate) async fn compensate(
        &self,
        mut tx: Transaction,
        reason: &str,
        log: &mut StepLog,
    ) -> Transaction {
        let transaction_id = tx.transaction_id;

        if tx.status() != TransactionStatus::Compensating
            && let Err(e) = tx.transition_to(TransactionStatus::Compensating)
        {
            let e = SagaError::from(e);
            tracing::error!(%transaction_id, error = %e, "cannot start compensation");
            log.failed("compensate", &e);
            return tx;
        }
        if tx.failure_reason.is_none() {
            tx.failure_reason = Some(reason.to_string());
        }

        let scheduled = tx.schedule_compensations(self.config.max_retries);
        tracing::info!(%transaction_id, ?scheduled, reason, "compensation started");
        if !self.persist(&mut tx, log).await {
            return tx;
        }

        for index in 0..tx.compensation_actions.len() {
            if tx.compensation_actions[index].status == CompensationStatus::Pending
                && !self.run_with_retries(&mut tx, index, reason, log).await
            {
                return tx;
            }
        }

        if let Some(status) = tx.compensation_outcome()
            && let Err(e) = tx.transition_to(status)
        {
            tracing::error!(%transaction_id, error = %e, "cannot finish compensation");
        }

        match tx.status() {
            TransactionStatus::Compensated => {
                tracing::info!(%transaction_id, "transaction compensated");
            }
            status => {
                tracing::error!(
                    %transaction_id,
                    %status,
                    "compensation incomplete, left for retry sweep"
                );
            }
        }
        self.persist(&mut tx, log).await;
        tx
    }

    /// Attempts one action until it completes or exhausts its retries,
    /// persisting the transaction after every attempt. Returns false if
    /// the run lost the record to another writer.
    async fn run_with_retries(
        &self,
        tx: &mut Transaction,
        index: usize,
        reason: &str,
        log: &mut StepLog,
    ) -> bool {
        let transaction_id = tx.transaction_id;
        let action_type = tx.compensation_actions[index].action_type;

        loop {
            let attempt = self.execute_action(tx, action_type, reason).await;
            let action = &mut tx.compensation_actions[index];

            match attempt {
                Ok(()) => {
                    action.record_success();
                    metrics::counter!(
                        "compensation_actions_total",
                        "action" => action_type.as_str(),
                        "outcome" => "completed"
                    )
                    .increment(1);
                    tracing::info!(
                        %transaction_id,
                        action = %action_type,
                        "compensation action completed"
                    );
                    log.completed(action_type.as_str());
                }
                Err(e) => {
                    let status = action.record_failure(e.to_string());
                    let attempt = action.retry_count;
                    metrics::counter!(
                        "compensation_actions_total",
                        "action" => action_type.as_str(),
                        "outcome" => "failed"
                    )
                    .increment(1);
                    tracing::warn!(
                        %transaction_id,
                        action = %action_type,
                        attempt,
                        error = %e,
                        "compensation action failed"
                    );
                    if status == CompensationStatus::Failed {
                        tracing::error!(
                            %transaction_id,
                            action = %action_type,
                            "compensation action exhausted its retries"
                        );
                        log.failed(action_type.as_str(), &e);
                    }
                }
            }

            tx.touch();
            if !self.persist(tx, log).await {
                return false;
            }

            if tx.compensation_actions[index].status != CompensationStatus::Pending {
                return true;
            }
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    /// Performs the reversal for one action type, using the handles recorded
    /// on the transaction.
    async fn execute_action(
        &self,
        tx: &Transaction,
        action_type: CompensationType,
        reason: &str,
    ) -> Result<(), SagaError> {
        match action_type {
            CompensationType::RefundPayment => {
                let payment_intent_id = tx
                    .payment_intent_id
                    .clone()
                    .ok_or_else(|| SagaError::Payment("no payment intent recorded".to_string()))?;
                let gateway = self.services.payments.gateway(tx.payment_method)?;
                let request = RefundRequest {
                    payment_intent_id,
                    amount: tx.total_amount,
                    reason: reason.to_string(),
                };
                self.bounded(steps::STEP_REFUND_PAYMENT, gateway.refund(request))
                    .await?;
            }
            CompensationType::ReleaseInventory => {
                let reservation_id = tx.inventory_reservation_id.as_deref().ok_or_else(|| {
                    SagaError::Inventory("no inventory reservation recorded".to_string())
                })?;
                self.bounded(
                    steps::STEP_RELEASE_INVENTORY,
                    self.services.inventory.release(reservation_id),
                )
                .await?;
            }
            CompensationType::CancelOrder => {
                self.bounded(
                    steps::STEP_CANCEL_ORDER,
                    self.services.orders.cancel_order(tx.transaction_id, reason),
                )
                .await?;
            }
            CompensationType::Notify => {
                let event = CheckoutEvent::checkout_cancelled(
                    tx.transaction_id,
                    tx.merchant_id.clone(),
                    tx.user_id.clone(),
                    reason,
                );
                self.publish(steps::STEP_NOTIFY, &event).await?;
            }
        }
        Ok(())
    }

    /// Makes one more attempt at every open compensation action of the
    /// transactions no saga run is working on: `failed` ones, and
    /// `compensating` ones idle for `stale_compensation_after`.
    ///
    /// Each transaction is claimed with a compare-and-swap before any action
    /// runs, so a concurrent writer makes the sweep skip it. Each action gets
    /// at most `max_sweep_attempts` sweep attempts; the attempt that
    /// exhausts them raises a single operational alert.
    #[tracing::instrument(skip(self))]
    pub async fn retry_failed_compensations(&self) -> Result<SweepReport, SagaError> {
        metrics::counter!("compensation_sweeps_total").increment(1);
        let stale_before = TimeDelta::from_std(self.config.stale_compensation_after)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let open = self.store.list_open_compensations(stale_before).await?;
        let mut report = SweepReport::default();

        for mut tx in open {
            report.transactions_scanned += 1;
            if !self.has_sweepable_action(&tx) {
                continue;
            }

            tx.touch();
            match self.store.save(&mut tx).await {
                Ok(_) => {}
                Err(LedgerError::ConcurrencyConflict { .. }) => {
                    tracing::debug!(
                        transaction_id = %tx.transaction_id,
                        "transaction updated concurrently, skipped by sweep"
                    );
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        transaction_id = %tx.transaction_id,
                        error = %e,
                        "sweep could not claim transaction"
                    );
                    report.errors.push(format!("{}: {e}", tx.transaction_id));
                    continue;
                }
            }

            self.sweep_transaction(&mut tx, &mut report).await;

            if tx.status() == TransactionStatus::Compensated {
                report.transactions_compensated += 1;
            }
            if let Err(e) = self.store.save(&mut tx).await {
                tracing::warn!(
                    transaction_id = %tx.transaction_id,
                    error = %e,
                    "sweep could not update transaction"
                );
                report
                    .errors
                    .push(format!("{}: {e}", tx.transaction_id));
            }
        }

        tracing::info!(
            scanned = report.transactions_scanned,
            attempted = report.actions_attempted,
            completed = report.actions_completed,
            alerts = report.alerts_raised,
            "compensation sweep finished"
        );
        Ok(report)
    }

    fn has_sweepable_action(&self, tx: &Transaction) -> bool {
        tx.compensation_actions
            .iter()
            .any(|a| a.is_open() && a.sweep_attempts < self.config.max_sweep_attempts)
    }

    /// Makes one attempt at each open action of a claimed transaction.
    async fn sweep_transaction(&self, tx: &mut Transaction, report: &mut SweepReport) {
        let transaction_id = tx.transaction_id;
        let reason = tx
            .failure_reason
            .clone()
            .unwrap_or_else(|| "retry sweep".to_string());
        for index in 0..tx.compensation_actions.len() {
            let action = &tx.compensation_actions[index];
            if !action.is_open() || action.sweep_attempts >= self.config.max_sweep_attempts {
                continue;
            }
            let action_type = action.action_type;
            report.actions_attempted += 1;

            match self.execute_action(tx, action_type, &reason).await {
                Ok(()) => {
                    tx.compensation_actions[index].record_success();
                    report.actions_completed += 1;
                    metrics::counter!(
                        "compensation_actions_total",
                        "action" => action_type.as_str(),
                        "outcome" => "completed"
                    )
                    .increment(1);
                    tracing::info!(
                        %transaction_id,
                        action = %action_type,
                        "sweep completed compensation action"
                    );
                }
                Err(e) => {
                    let action = &mut tx.compensation_actions[index];
                    action.record_sweep_failure(e.to_string());
                    report.actions_failed += 1;
                    metrics::counter!(
                        "compensation_actions_total",
                        "action" => action_type.as_str(),
                        "outcome" => "failed"
                    )
                    .increment(1);
                    tracing::warn!(
                        %transaction_id,
                        action = %action_type,
                        sweep_attempts = action.sweep_attempts,
                        error = %e,
                        "sweep attempt failed"
                    );

                    if action.sweep_attempts >= self.config.max_sweep_attempts && !action.alerted {
                        let alert = OperationalAlert {
                            transaction_id,
                            merchant_id: tx.merchant_id.clone(),
                            action_type,
                            attempts: action.retry_count + action.sweep_attempts,
                            last_error: action.last_error.clone(),
                        };
                        match self
                            .bounded(steps::STEP_RAISE_ALERT, self.services.alerts.raise(alert))
                            .await
                        {
                            Ok(()) => {
                                tx.compensation_actions[index].alerted = true;
                                report.alerts_raised += 1;
                            }
                            Err(e) => {
                                tracing::error!(
                                    %transaction_id,
                                    error = %e,
                                    "failed to raise alert"
                                );
                            }
                        }
                    }
                }
            }
        }

        if let Some(status) = tx.compensation_outcome()
            && status != tx.status()
            && let Err(e) = tx.transition_to(status)
        {
            tracing::error!(%transaction_id, error = %e, "sweep cannot update status");
        }
        tx.touch();
    }

    /// Saves `tx`, recording but not propagating ledger failures.
    ///
    /// Returns false if another writer got there first; `tx` is then
    /// replaced by the stored record and the caller must stop acting on it.
    async fn persist(&self, tx: &mut Transaction, log: &mut StepLog) -> bool {
        let transaction_id = tx.transaction_id;
        match self.store.save(tx).await {
            Ok(_) => true,
            Err(e @ LedgerError::ConcurrencyConflict { .. }) => {
                tracing::warn!(
                    %transaction_id,
                    error = %e,
                    "transaction taken over by another writer, stopping compensation"
                );
                log.errors.push(format!("persist: {e}"));
                match self.store.require(transaction_id).await {
                    Ok(stored) => *tx = stored,
                    Err(e) => {
                        tracing::error!(%transaction_id, error = %e, "failed to reload transaction");
                    }
                }
                false
            }
            Err(e) => {
                tracing::error!(
                    %transaction_id,
                    error = %e,
                    "failed to persist transaction"
                );
                log.errors.push(format!("persist: {e}"));
                true
            }
        }
    }
}
