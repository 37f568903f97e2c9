//! Inbound request envelope and per-operation payloads.

use std::collections::BTreeMap;

use common::Money;
use ledger::{LineItem, PaymentMethod};
use rust_decimal::Decimal;
use saga::{CheckoutRequest, Consent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OrchestratorError, Result};

/// The operations the orchestrator can route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Chat,
    Search,
    Checkout,
    Analytics,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Chat,
        Operation::Search,
        Operation::Checkout,
        Operation::Analytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Chat => "chat",
            Operation::Search => "search",
            Operation::Checkout => "checkout",
            Operation::Analytics => "analytics",
        }
    }

    pub fn parse(value: &str) -> Option<Operation> {
        Operation::ALL.into_iter().find(|op| op.as_str() == value)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request envelope as received from the transport.
///
/// Fields are kept loose (optional strings, raw payload) so that a malformed
/// request still deserializes and can be answered with a structured
/// validation failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationRequest {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub merchant_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub payload: Value,
}

impl OrchestrationRequest {
    pub fn new(
        request_id: impl Into<String>,
        merchant_id: impl Into<String>,
        user_id: impl Into<String>,
        operation: Operation,
        payload: Value,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            merchant_id: merchant_id.into(),
            user_id: user_id.into(),
            session_id: None,
            operation: operation.as_str().to_string(),
            payload,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Checks the envelope and parses the payload for the named operation.
    pub fn validate(&self) -> Result<ValidatedRequest> {
        if self.request_id.trim().is_empty() {
            return Err(invalid("requestId is required"));
        }
        if self.merchant_id.trim().is_empty() {
            return Err(invalid("merchantId is required"));
        }
        if self.user_id.trim().is_empty() {
            return Err(invalid("userId is required"));
        }
        let operation = Operation::parse(&self.operation).ok_or_else(|| {
            invalid(format!(
                "operation must be one of chat, search, checkout, analytics (got '{}')",
                self.operation
            ))
        })?;
        let payload = OperationPayload::parse(operation, &self.payload)?;

        Ok(ValidatedRequest {
            request_id: self.request_id.clone(),
            merchant_id: self.merchant_id.clone(),
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone().filter(|s| !s.trim().is_empty()),
            operation,
            payload,
        })
    }
}

/// A request whose envelope and payload passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub request_id: String,
    pub merchant_id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub operation: Operation,
    pub payload: OperationPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub message: String,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPayload {
    pub query: String,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// A basket line as sent by the storefront, priced in major units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    pub items: Vec<CheckoutItem>,
    pub currency: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_details: Value,
    #[serde(default)]
    pub consent: Consent,
}

impl CheckoutPayload {
    /// Converts the storefront basket into a saga request.
    ///
    /// Prices are rounded to whole cents; item-level rules (positive
    /// quantity and price, consent) are left to the saga.
    pub fn into_checkout_request(
        self,
        merchant_id: &str,
        user_id: &str,
        session_id: Option<String>,
    ) -> Result<CheckoutRequest> {
        let items = self
            .items
            .into_iter()
            .map(|item| {
                let unit_price = Money::from_decimal(item.unit_price).ok_or_else(|| {
                    invalid(format!("unit price of {} is out of range", item.product_id))
                })?;
                let name = if item.name.is_empty() {
                    item.product_id.clone()
                } else {
                    item.name
                };
                Ok(LineItem::new(
                    item.product_id,
                    name,
                    item.quantity,
                    unit_price,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CheckoutRequest {
            merchant_id: merchant_id.to_string(),
            user_id: user_id.to_string(),
            session_id,
            items,
            currency: self.currency.to_ascii_uppercase(),
            payment_method: self.payment_method,
            payment_details: self.payment_details,
            consent: self.consent,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsPayload {
    pub report: String,
    #[serde(default)]
    pub parameters: Value,
}

/// Operation-specific payload, parsed from the raw envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationPayload {
    Chat(ChatPayload),
    Search(SearchPayload),
    Checkout(CheckoutPayload),
    Analytics(AnalyticsPayload),
}

impl OperationPayload {
    pub fn parse(operation: Operation, payload: &Value) -> Result<Self> {
        let parsed = match operation {
            Operation::Chat => {
                let chat: ChatPayload = from_payload(operation, payload)?;
                if chat.message.trim().is_empty() {
                    return Err(invalid("chat message must not be empty"));
                }
                OperationPayload::Chat(chat)
            }
            Operation::Search => {
                let search: SearchPayload = from_payload(operation, payload)?;
                if search.query.trim().is_empty() {
                    return Err(invalid("search query must not be empty"));
                }
                if search.limit == Some(0) {
                    return Err(invalid("search limit must be positive"));
                }
                OperationPayload::Search(search)
            }
            Operation::Checkout => {
                let checkout: CheckoutPayload = from_payload(operation, payload)?;
                if checkout.items.is_empty() {
                    return Err(invalid("checkout requires at least one item"));
                }
                OperationPayload::Checkout(checkout)
            }
            Operation::Analytics => {
                let analytics: AnalyticsPayload = from_payload(operation, payload)?;
                if analytics.report.trim().is_empty() {
                    return Err(invalid("analytics report name must not be empty"));
                }
                OperationPayload::Analytics(analytics)
            }
        };
        Ok(parsed)
    }
}

fn from_payload<T: serde::de::DeserializeOwned>(operation: Operation, payload: &Value) -> Result<T> {
    serde_json::from_value(payload.clone())
        .map_err(|e| invalid(format!("invalid {operation} payload: {e}")))
}

fn invalid(message: impl Into<String>) -> OrchestratorError {
    OrchestratorError::Validation(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chat_request() -> OrchestrationRequest {
        OrchestrationRequest::new(
            "req-1",
            "merchant-1",
            "user-1",
            Operation::Chat,
            json!({ "message": "waterproof jacket" }),
        )
    }

    #[test]
    fn test_valid_chat_request() {
        let validated = chat_request().validate().unwrap();
        assert_eq!(validated.operation, Operation::Chat);
        assert!(matches!(validated.payload, OperationPayload::Chat(ref c) if c.message == "waterproof jacket"));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut request = chat_request();
        request.request_id = String::new();
        assert!(matches!(
            request.validate(),
            Err(OrchestratorError::Validation(m)) if m.contains("requestId")
        ));

        let mut request = chat_request();
        request.merchant_id = "  ".to_string();
        assert!(request.validate().is_err());

        let mut request = chat_request();
        request.user_id = String::new();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let mut request = chat_request();
        request.operation = "refund".to_string();
        let err = request.validate().unwrap_err();
        assert_eq!(err.kind(), common::ErrorKind::Validation);
        assert!(err.to_string().contains("refund"));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let mut request = chat_request();
        request.payload = json!({ "text": "hi" });
        assert!(request.validate().is_err());

        request.operation = "search".to_string();
        request.payload = json!({ "query": "boots", "limit": 0 });
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_envelope_deserializes_camel_case() {
        let request: OrchestrationRequest = serde_json::from_value(json!({
            "requestId": "req-9",
            "merchantId": "m",
            "userId": "u",
            "sessionId": "s-1",
            "operation": "search",
            "payload": { "query": "boots" }
        }))
        .unwrap();
        let validated = request.validate().unwrap();
        assert_eq!(validated.session_id.as_deref(), Some("s-1"));
        assert_eq!(validated.operation, Operation::Search);
    }

    #[test]
    fn test_checkout_payload_converts_prices_to_cents() {
        let payload: CheckoutPayload = serde_json::from_value(json!({
            "items": [
                { "productId": "SKU-001", "name": "Widget", "quantity": 1, "unitPrice": "19.99" },
                { "productId": "SKU-002", "quantity": 1, "unitPrice": 29.99 }
            ],
            "currency": "usd",
            "paymentMethod": "card",
            "consent": { "termsAccepted": true, "privacyAccepted": true }
        }))
        .unwrap();

        let request = payload
            .into_checkout_request("merchant-1", "user-1", None)
            .unwrap();
        assert_eq!(request.currency, "USD");
        assert_eq!(request.items[0].unit_price, Money::from_cents(1999));
        assert_eq!(request.items[1].unit_price, Money::from_cents(2999));
        assert_eq!(request.items[1].name, "SKU-002");
        assert_eq!(request.validate().unwrap(), Money::from_cents(4998));
    }
}
