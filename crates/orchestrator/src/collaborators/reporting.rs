//! Reporting collaborator for analytics requests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use crate::error::CollaboratorError;

#[async_trait]
pub trait ReportingService: Send + Sync {
    async fn report(
        &self,
        merchant_id: &str,
        report: &str,
        parameters: &Value,
    ) -> Result<Value, CollaboratorError>;
}

/// Returns an empty report of the requested name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReporting {
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicU32>,
}

impl InMemoryReporting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportingService for InMemoryReporting {
    async fn report(
        &self,
        merchant_id: &str,
        report: &str,
        parameters: &Value,
    ) -> Result<Value, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable(
                "reporting",
                "Warehouse unavailable",
            ));
        }
        Ok(json!({
            "report": report,
            "merchantId": merchant_id,
            "parameters": parameters,
            "generatedAt": Utc::now(),
            "rows": [],
        }))
    }
}
