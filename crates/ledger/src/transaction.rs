//! The checkout transaction record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compensation::{CompensationAction, CompensationStatus, CompensationType};
use crate::error::{LedgerError, Result};
use crate::status::TransactionStatus;
use crate::version::Version;
use crate::{Money, TransactionId};

/// Payment method selected by the shopper; routes the charge to a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    Paypal,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A purchased product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    /// Price per unit.
    pub unit_price: Money,
}

impl LineItem {
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns quantity * unit price, or `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

/// The saga's persistent record of one checkout.
///
/// Created with status `Pending`; mutated in place as each step completes.
/// Status changes go through [`Transaction::transition_to`] so the state
/// machine in [`TransactionStatus`] cannot be bypassed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub merchant_id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    status: TransactionStatus,
    pub items: Vec<LineItem>,
    pub total_amount: Money,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_intent_id: Option<String>,
    pub inventory_reservation_id: Option<String>,
    pub order_reference: Option<String>,
    pub compensation_actions: Vec<CompensationAction>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
    /// Stored row version; maintained by the store.
    #[serde(default)]
    pub version: Version,
}

impl Transaction {
    /// Creates a new pending transaction with a fresh idempotency key.
    pub fn new(
        merchant_id: impl Into<String>,
        user_id: impl Into<String>,
        session_id: Option<String>,
        items: Vec<LineItem>,
        total_amount: Money,
        currency: impl Into<String>,
        payment_method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            transaction_id: TransactionId::new(),
            merchant_id: merchant_id.into(),
            user_id: user_id.into(),
            session_id,
            status: TransactionStatus::Pending,
            items,
            total_amount,
            currency: currency.into(),
            payment_method,
            payment_intent_id: None,
            inventory_reservation_id: None,
            order_reference: None,
            compensation_actions: Vec::new(),
            failure_reason: None,
            created_at: now,
            updated_at: now,
            metadata: BTreeMap::new(),
            version: Version::initial(),
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Moves to `next`, rejecting transitions outside the state machine.
    pub fn transition_to(&mut self, next: TransactionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Stores the inventory reservation handle. Allowed once per saga run.
    pub fn record_reservation(&mut self, reservation_id: impl Into<String>) -> Result<()> {
        if self.inventory_reservation_id.is_some() {
            return Err(LedgerError::HandleAlreadyRecorded {
                transaction_id: self.transaction_id,
                handle: "inventory_reservation_id",
            });
        }
        self.inventory_reservation_id = Some(reservation_id.into());
        self.touch();
        Ok(())
    }

    /// Stores the payment intent handle. Allowed once per saga run.
    pub fn record_payment_intent(&mut self, payment_intent_id: impl Into<String>) -> Result<()> {
        if self.payment_intent_id.is_some() {
            return Err(LedgerError::HandleAlreadyRecorded {
                transaction_id: self.transaction_id,
                handle: "payment_intent_id",
            });
        }
        self.payment_intent_id = Some(payment_intent_id.into());
        self.touch();
        Ok(())
    }

    /// Compensations implied by the side effects this transaction completed,
    /// in execution order: reverse of the forward steps, then cancel and notify.
    pub fn required_compensations(&self) -> Vec<CompensationType> {
        let mut required = Vec::with_capacity(4);
        if self.payment_intent_id.is_some() {
            required.push(CompensationType::RefundPayment);
        }
        if self.inventory_reservation_id.is_some() {
            required.push(CompensationType::ReleaseInventory);
        }
        required.push(CompensationType::CancelOrder);
        required.push(CompensationType::Notify);
        required
    }

    /// Returns the action of the given type, if one was ever scheduled.
    pub fn compensation(&self, action_type: CompensationType) -> Option<&CompensationAction> {
        self.compensation_actions
            .iter()
            .find(|a| a.action_type == action_type)
    }

    /// Schedules every required compensation that has not been scheduled yet.
    ///
    /// At most one action per type ever exists, so repeated calls never
    /// duplicate a release or refund. Returns the newly scheduled types.
    pub fn schedule_compensations(&mut self, max_retries: u32) -> Vec<CompensationType> {
        let mut scheduled = Vec::new();
        for action_type in self.required_compensations() {
            if self.compensation(action_type).is_none() {
                self.compensation_actions
                    .push(CompensationAction::new(action_type, max_retries));
                scheduled.push(action_type);
            }
        }
        if !scheduled.is_empty() {
            self.touch();
        }
        scheduled
    }

    /// Returns true if any compensation action still needs executing.
    pub fn has_open_compensations(&self) -> bool {
        self.compensation_actions.iter().any(|a| a.is_open())
    }

    /// Status implied by the compensation actions: `Compensated` once all
    /// completed, `Failed` once none are pending but some failed, otherwise `None`.
    pub fn compensation_outcome(&self) -> Option<TransactionStatus> {
        let actions = &self.compensation_actions;
        if actions.is_empty() {
            return None;
        }
        if actions
            .iter()
            .all(|a| a.status == CompensationStatus::Completed)
        {
            return Some(TransactionStatus::Compensated);
        }
        if actions
            .iter()
            .any(|a| a.status == CompensationStatus::Pending)
        {
            return None;
        }
        Some(TransactionStatus::Failed)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        Transaction::new(
            "merchant-1",
            "user-1",
            Some("session-1".to_string()),
            vec![
                LineItem::new("SKU-001", "Widget", 1, Money::from_cents(1999)),
                LineItem::new("SKU-002", "Gadget", 1, Money::from_cents(2999)),
            ],
            Money::from_cents(4998),
            "USD",
            PaymentMethod::Card,
        )
    }

    #[test]
    fn test_new_transaction_is_pending() {
        let tx = sample();
        assert_eq!(tx.status(), TransactionStatus::Pending);
        assert_eq!(tx.version, Version::initial());
        assert!(tx.compensation_actions.is_empty());
    }

    #[test]
    fn test_transition_follows_state_machine() {
        let mut tx = sample();
        tx.transition_to(TransactionStatus::InventoryReserved).unwrap();
        tx.transition_to(TransactionStatus::PaymentProcessed).unwrap();
        tx.transition_to(TransactionStatus::Confirmed).unwrap();

        let err = tx
            .transition_to(TransactionStatus::Compensating)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidTransition {
                from: TransactionStatus::Confirmed,
                to: TransactionStatus::Compensating,
            }
        ));
    }

    #[test]
    fn test_reservation_recorded_once() {
        let mut tx = sample();
        tx.record_reservation("RES-0001").unwrap();
        assert!(tx.record_reservation("RES-0002").is_err());
        assert_eq!(tx.inventory_reservation_id.as_deref(), Some("RES-0001"));
    }

    #[test]
    fn test_required_compensations_follow_completed_side_effects() {
        let mut tx = sample();
        assert_eq!(
            tx.required_compensations(),
            vec![CompensationType::CancelOrder, CompensationType::Notify]
        );

        tx.record_reservation("RES-0001").unwrap();
        assert_eq!(
            tx.required_compensations(),
            vec![
                CompensationType::ReleaseInventory,
                CompensationType::CancelOrder,
                CompensationType::Notify
            ]
        );

        tx.record_payment_intent("pi_1").unwrap();
        assert_eq!(
            tx.required_compensations()[..2],
            [
                CompensationType::RefundPayment,
                CompensationType::ReleaseInventory
            ]
        );
    }

    #[test]
    fn test_schedule_compensations_is_idempotent() {
        let mut tx = sample();
        tx.record_reservation("RES-0001").unwrap();

        let first = tx.schedule_compensations(3);
        let second = tx.schedule_compensations(3);

        assert_eq!(first.len(), 3);
        assert!(second.is_empty());
        let releases = tx
            .compensation_actions
            .iter()
            .filter(|a| a.action_type == CompensationType::ReleaseInventory)
            .count();
        assert_eq!(releases, 1);
    }

    #[test]
    fn test_compensation_outcome() {
        let mut tx = sample();
        assert_eq!(tx.compensation_outcome(), None);

        tx.schedule_compensations(1);
        assert_eq!(tx.compensation_outcome(), None);

        for action in &mut tx.compensation_actions {
            action.record_success();
        }
        assert_eq!(
            tx.compensation_outcome(),
            Some(TransactionStatus::Compensated)
        );

        tx.compensation_actions[0].record_failure("down");
        assert_eq!(tx.compensation_outcome(), Some(TransactionStatus::Failed));
        assert!(tx.has_open_compensations());
    }

    #[test]
    fn test_serialization_roundtrip_keeps_status() {
        let mut tx = sample();
        tx.transition_to(TransactionStatus::InventoryReserved).unwrap();
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status(), TransactionStatus::InventoryReserved);
        assert_eq!(back, tx);
    }
}
