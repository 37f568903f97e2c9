//! Events published to the notification collaborator.

use chrono::{DateTime, Utc};
use common::{Money, TransactionId};
use serde::{Deserialize, Serialize};

use crate::steps;

/// Events the checkout saga publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    /// The order was confirmed.
    OrderCreated(OrderCreatedData),

    /// The checkout was rolled back.
    CheckoutCancelled(CheckoutCancelledData),
}

impl CheckoutEvent {
    /// Returns the event type string used when publishing.
    pub fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::OrderCreated(_) => steps::EVENT_ORDER_CREATED,
            CheckoutEvent::CheckoutCancelled(_) => steps::EVENT_CHECKOUT_CANCELLED,
        }
    }

    /// Returns the event data as a JSON payload.
    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            CheckoutEvent::OrderCreated(data) => serde_json::to_value(data),
            CheckoutEvent::CheckoutCancelled(data) => serde_json::to_value(data),
        }
    }

    pub fn order_created(
        transaction_id: TransactionId,
        merchant_id: impl Into<String>,
        user_id: impl Into<String>,
        order_reference: impl Into<String>,
        total_amount: Money,
        currency: impl Into<String>,
    ) -> Self {
        CheckoutEvent::OrderCreated(OrderCreatedData {
            transaction_id,
            merchant_id: merchant_id.into(),
            user_id: user_id.into(),
            order_reference: order_reference.into(),
            total_amount,
            currency: currency.into(),
            created_at: Utc::now(),
        })
    }

    pub fn checkout_cancelled(
        transaction_id: TransactionId,
        merchant_id: impl Into<String>,
        user_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CheckoutEvent::CheckoutCancelled(CheckoutCancelledData {
            transaction_id,
            merchant_id: merchant_id.into(),
            user_id: user_id.into(),
            reason: reason.into(),
            cancelled_at: Utc::now(),
        })
    }
}

/// Data for the OrderCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub transaction_id: TransactionId,
    pub merchant_id: String,
    pub user_id: String,
    pub order_reference: String,
    pub total_amount: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Data for the CheckoutCancelled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutCancelledData {
    pub transaction_id: TransactionId,
    pub merchant_id: String,
    pub user_id: String,
    /// Why the checkout was rolled back.
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types() {
        let id = TransactionId::new();
        let created =
            CheckoutEvent::order_created(id, "m", "u", "ORD-1", Money::from_cents(100), "USD");
        let cancelled = CheckoutEvent::checkout_cancelled(id, "m", "u", "payment declined");

        assert_eq!(created.event_type(), "checkout.order_created");
        assert_eq!(cancelled.event_type(), "checkout.cancelled");
    }

    #[test]
    fn test_payload_carries_data_only() {
        let id = TransactionId::new();
        let event = CheckoutEvent::checkout_cancelled(id, "m", "u", "payment declined");
        let payload = event.payload().unwrap();

        assert_eq!(payload["reason"], "payment declined");
        assert_eq!(payload["transaction_id"], id.to_string());
        assert!(payload.get("type").is_none());
    }
}
