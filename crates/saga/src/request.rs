//! Checkout request and result types.

use common::{ErrorKind, Money, TransactionId};
use ledger::{LineItem, PaymentMethod, Transaction, TransactionStatus};
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// Consent flags the shopper must accept before checkout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consent {
    pub terms_accepted: bool,
    pub privacy_accepted: bool,
}

impl Consent {
    pub fn accepted() -> Self {
        Self {
            terms_accepted: true,
            privacy_accepted: true,
        }
    }
}

/// A request to check out a basket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub merchant_id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub items: Vec<LineItem>,
    pub currency: String,
    pub payment_method: PaymentMethod,
    /// Passed through to the payment gateway.
    #[serde(default)]
    pub payment_details: serde_json::Value,
    pub consent: Consent,
}

impl CheckoutRequest {
    /// Checks consent and item data and returns the order total.
    pub fn validate(&self) -> Result<Money, SagaError> {
        if !self.consent.terms_accepted {
            return Err(SagaError::Validation("terms must be accepted".to_string()));
        }
        if !self.consent.privacy_accepted {
            return Err(SagaError::Validation(
                "privacy policy must be accepted".to_string(),
            ));
        }
        if self.merchant_id.trim().is_empty() || self.user_id.trim().is_empty() {
            return Err(SagaError::Validation(
                "merchant and user are required".to_string(),
            ));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(SagaError::Validation(format!(
                "invalid currency code '{}'",
                self.currency
            )));
        }
        if self.items.is_empty() {
            return Err(SagaError::Validation("no items to check out".to_string()));
        }

        let mut total = Money::zero();
        for item in &self.items {
            if item.quantity == 0 {
                return Err(SagaError::Validation(format!(
                    "quantity for {} must be positive",
                    item.product_id
                )));
            }
            if !item.unit_price.is_positive() {
                return Err(SagaError::Validation(format!(
                    "price for {} must be positive",
                    item.product_id
                )));
            }
            total = item
                .line_total()
                .and_then(|line| total.checked_add(line))
                .ok_or_else(|| SagaError::Validation("order total overflows".to_string()))?;
        }
        Ok(total)
    }
}

/// Final result of a checkout. Produced for every request, including
/// rejected and rolled-back ones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    /// `None` if the request was rejected before a transaction was created.
    pub transaction_id: Option<TransactionId>,
    pub status: Option<TransactionStatus>,
    pub order_reference: Option<String>,
    pub total_amount: Option<Money>,
    pub currency: Option<String>,
    /// Forward steps and compensations that completed, in order.
    pub actions_executed: Vec<String>,
    pub errors: Vec<String>,
    /// Failures of best-effort steps that did not affect the outcome.
    pub warnings: Vec<String>,
    pub error_kind: Option<ErrorKind>,
}

impl CheckoutOutcome {
    pub(crate) fn rejected(error: &SagaError) -> Self {
        Self {
            transaction_id: None,
            status: None,
            order_reference: None,
            total_amount: None,
            currency: None,
            actions_executed: Vec::new(),
            errors: vec![error.to_string()],
            warnings: Vec::new(),
            error_kind: Some(error.kind()),
        }
    }

    pub(crate) fn from_transaction(transaction: &Transaction, log: StepLog) -> Self {
        Self {
            transaction_id: Some(transaction.transaction_id),
            status: Some(transaction.status()),
            order_reference: transaction.order_reference.clone(),
            total_amount: Some(transaction.total_amount),
            currency: Some(transaction.currency.clone()),
            actions_executed: log.actions,
            errors: log.errors,
            warnings: log.warnings,
            error_kind: log.error_kind,
        }
    }

    /// Returns true if the order was confirmed.
    pub fn is_confirmed(&self) -> bool {
        self.status == Some(TransactionStatus::Confirmed)
    }
}

/// Result of an explicit compensation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensationReport {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    pub actions_executed: Vec<String>,
    pub errors: Vec<String>,
}

/// Summary of one retry sweep over open compensations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub transactions_scanned: usize,
    pub actions_attempted: usize,
    pub actions_completed: usize,
    pub actions_failed: usize,
    pub transactions_compensated: usize,
    pub alerts_raised: usize,
    /// Ledger errors that prevented a transaction from being updated.
    pub errors: Vec<String>,
}

/// Accumulates what happened during a saga run.
#[derive(Debug, Default)]
pub(crate) struct StepLog {
    pub actions: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub error_kind: Option<ErrorKind>,
}

impl StepLog {
    pub fn completed(&mut self, step: &str) {
        self.actions.push(step.to_string());
    }

    /// Records a failure; the first failure decides the outcome's error kind.
    pub fn failed(&mut self, step: &str, error: &SagaError) {
        self.errors.push(format!("{step}: {error}"));
        self.error_kind.get_or_insert(error.kind());
    }

    pub fn warn(&mut self, step: &str, error: &SagaError) {
        self.warnings.push(format!("{step}: {error}"));
    }
}
