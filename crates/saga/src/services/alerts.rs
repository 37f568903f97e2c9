//! Operational alerts for compensations that need manual follow-up.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::TransactionId;
use ledger::CompensationType;
use serde::Serialize;

use crate::error::SagaError;

/// A compensation action that exhausted both saga retries and sweep attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationalAlert {
    pub transaction_id: TransactionId,
    pub merchant_id: String,
    pub action_type: CompensationType,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Sink for operational alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn raise(&self, alert: OperationalAlert) -> Result<(), SagaError>;
}

/// Alert sink that writes alerts to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn raise(&self, alert: OperationalAlert) -> Result<(), SagaError> {
        tracing::error!(
            transaction_id = %alert.transaction_id,
            merchant_id = %alert.merchant_id,
            action = %alert.action_type,
            attempts = alert.attempts,
            last_error = alert.last_error.as_deref().unwrap_or(""),
            "compensation requires manual intervention"
        );
        Ok(())
    }
}

/// In-memory alert sink that records raised alerts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAlertSink {
    alerts: Arc<RwLock<Vec<OperationalAlert>>>,
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all alerts raised so far.
    pub fn alerts(&self) -> Vec<OperationalAlert> {
        self.alerts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AlertSink for InMemoryAlertSink {
    async fn raise(&self, alert: OperationalAlert) -> Result<(), SagaError> {
        self.alerts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(alert);
        Ok(())
    }
}
