//! Notification service trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::SagaError;

/// Trait for publishing checkout events.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn publish(&self, event_type: &str, payload: serde_json::Value)
    -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    published: Vec<(String, serde_json::Value)>,
    fail_on_publish: bool,
}

/// In-memory notification service that records published events.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationService {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail every publish call.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_publish = fail;
    }

    /// Returns the event types published so far, in order.
    pub fn event_types(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .published
            .iter()
            .map(|(event_type, _)| event_type.clone())
            .collect()
    }

    /// Returns the payloads published under `event_type`.
    pub fn payloads(&self, event_type: &str) -> Vec<serde_json::Value> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .published
            .iter()
            .filter(|(t, _)| t == event_type)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn publish(
        &self,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_publish {
            return Err(SagaError::Notification("Broker unavailable".to_string()));
        }

        state.published.push((event_type.to_string(), payload));
        Ok(())
    }
}
