//! Payment gateway trait, method-based routing and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{Money, TransactionId};
use ledger::PaymentMethod;

use crate::error::SagaError;

/// A charge against a payment gateway.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub merchant_id: String,
    /// Idempotency key for the charge.
    pub transaction_id: TransactionId,
    pub amount: Money,
    pub currency: String,
    pub method: PaymentMethod,
    /// Gateway-specific payment details (tokenized card, wallet ID, ...).
    pub details: serde_json::Value,
}

/// Result of a successful charge.
#[derive(Debug, Clone)]
pub struct ChargeResult {
    /// Gateway status string, e.g. `"succeeded"`.
    pub status: String,
    pub payment_intent_id: String,
}

/// A refund of a previous charge.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub payment_intent_id: String,
    pub amount: Money,
    pub reason: String,
}

/// Result of a successful refund.
#[derive(Debug, Clone)]
pub struct RefundResult {
    pub status: String,
    pub refund_id: String,
}

/// Trait for payment gateway operations.
///
/// `refund` must be idempotent per payment intent: refunding an intent
/// twice returns the original refund.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeResult, SagaError>;

    async fn refund(&self, request: RefundRequest) -> Result<RefundResult, SagaError>;
}

/// Routes payments to a gateway by payment method.
#[derive(Clone, Default)]
pub struct PaymentRouter {
    gateways: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
}

impl PaymentRouter {
    /// Creates a router with no gateways.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router that sends every payment method to one gateway.
    pub fn single(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self::new()
            .with_gateway(PaymentMethod::Card, gateway.clone())
            .with_gateway(PaymentMethod::Paypal, gateway.clone())
            .with_gateway(PaymentMethod::BankTransfer, gateway)
    }

    /// Registers the gateway used for `method`, replacing any previous one.
    pub fn with_gateway(mut self, method: PaymentMethod, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(method, gateway);
        self
    }

    /// Returns the gateway for `method`.
    pub fn gateway(&self, method: PaymentMethod) -> Result<&Arc<dyn PaymentGateway>, SagaError> {
        self.gateways
            .get(&method)
            .ok_or(SagaError::NoGateway(method))
    }
}

#[derive(Debug)]
struct Payment {
    amount: Money,
    refund_id: Option<String>,
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<String, Payment>,
    next_id: u32,
    charge_calls: u32,
    refund_calls: u32,
    fail_on_charge: bool,
    fail_on_refund: bool,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryPaymentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryPaymentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the gateway to decline every charge.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.write().fail_on_charge = fail;
    }

    /// Configures the gateway to fail every refund.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.write().fail_on_refund = fail;
    }

    /// Returns the number of charges that have not been refunded.
    pub fn payment_count(&self) -> usize {
        self.read()
            .payments
            .values()
            .filter(|p| p.refund_id.is_none())
            .count()
    }

    /// Returns true if a charge exists with the given intent ID.
    pub fn has_payment(&self, payment_intent_id: &str) -> bool {
        self.read().payments.contains_key(payment_intent_id)
    }

    /// Returns true if the charge has been refunded.
    pub fn is_refunded(&self, payment_intent_id: &str) -> bool {
        self.read()
            .payments
            .get(payment_intent_id)
            .is_some_and(|p| p.refund_id.is_some())
    }

    pub fn charge_calls(&self) -> u32 {
        self.read().charge_calls
    }

    pub fn refund_calls(&self) -> u32 {
        self.read().refund_calls
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeResult, SagaError> {
        let mut state = self.write();
        state.charge_calls += 1;

        if state.fail_on_charge {
            return Err(SagaError::Payment("Payment declined".to_string()));
        }

        state.next_id += 1;
        let payment_intent_id = format!("PAY-{:04}", state.next_id);
        state.payments.insert(
            payment_intent_id.clone(),
            Payment {
                amount: request.amount,
                refund_id: None,
            },
        );

        Ok(ChargeResult {
            status: "succeeded".to_string(),
            payment_intent_id,
        })
    }

    async fn refund(&self, request: RefundRequest) -> Result<RefundResult, SagaError> {
        let mut state = self.write();
        state.refund_calls += 1;

        if state.fail_on_refund {
            return Err(SagaError::Payment("Refund failed".to_string()));
        }

        let payment = state
            .payments
            .get_mut(&request.payment_intent_id)
            .ok_or_else(|| {
                SagaError::Payment(format!("Unknown payment {}", request.payment_intent_id))
            })?;

        if request.amount > payment.amount {
            return Err(SagaError::Payment(format!(
                "Refund of {} exceeds charge of {}",
                request.amount, payment.amount
            )));
        }

        let refund_id = payment
            .refund_id
            .get_or_insert_with(|| format!("REF-{}", request.payment_intent_id))
            .clone();

        Ok(RefundResult {
            status: "refunded".to_string(),
            refund_id,
        })
    }
}
