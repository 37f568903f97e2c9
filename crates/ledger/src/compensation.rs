//! Compensation actions recorded against a transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The side effect a compensation action reverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationType {
    ReleaseInventory,
    RefundPayment,
    CancelOrder,
    Notify,
}

impl CompensationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompensationType::ReleaseInventory => "release_inventory",
            CompensationType::RefundPayment => "refund_payment",
            CompensationType::CancelOrder => "cancel_order",
            CompensationType::Notify => "notify",
        }
    }
}

impl std::fmt::Display for CompensationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompensationStatus {
    #[default]
    Pending,
    Completed,
    /// Retries exhausted; left for the retry sweep.
    Failed,
}

impl CompensationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompensationStatus::Pending => "pending",
            CompensationStatus::Completed => "completed",
            CompensationStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CompensationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One scheduled reversal of a completed side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationAction {
    pub action_id: Uuid,
    #[serde(rename = "type")]
    pub action_type: CompensationType,
    pub status: CompensationStatus,
    /// Attempts made by the saga itself.
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    /// Attempts made by the retry sweep after the saga gave up.
    #[serde(default)]
    pub sweep_attempts: u32,
    /// Set once an operational alert has been raised for this action.
    #[serde(default)]
    pub alerted: bool,
}

impl CompensationAction {
    /// Schedules a new pending action.
    pub fn new(action_type: CompensationType, max_retries: u32) -> Self {
        Self {
            action_id: Uuid::new_v4(),
            action_type,
            status: CompensationStatus::Pending,
            retry_count: 0,
            max_retries: max_retries.max(1),
            last_error: None,
            executed_at: None,
            sweep_attempts: 0,
            alerted: false,
        }
    }

    /// Returns true while the saga may still attempt this action.
    pub fn has_retries_left(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Returns true if the action still needs to be executed by someone.
    pub fn is_open(&self) -> bool {
        !matches!(self.status, CompensationStatus::Completed)
    }

    pub fn record_success(&mut self) {
        self.status = CompensationStatus::Completed;
        self.executed_at = Some(Utc::now());
        self.last_error = None;
    }

    /// Records a failed saga attempt and returns the resulting status.
    ///
    /// The action becomes `Failed` once `retry_count` reaches `max_retries`.
    pub fn record_failure(&mut self, error: impl Into<String>) -> CompensationStatus {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_error = Some(error.into());
        self.executed_at = Some(Utc::now());
        self.status = if self.has_retries_left() {
            CompensationStatus::Pending
        } else {
            CompensationStatus::Failed
        };
        self.status
    }

    /// Records a failed attempt made by the retry sweep.
    pub fn record_sweep_failure(&mut self, error: impl Into<String>) {
        self.sweep_attempts = self.sweep_attempts.saturating_add(1);
        self.last_error = Some(error.into());
        self.executed_at = Some(Utc::now());
        self.status = CompensationStatus::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_action_is_pending() {
        let action = CompensationAction::new(CompensationType::ReleaseInventory, 3);
        assert_eq!(action.status, CompensationStatus::Pending);
        assert_eq!(action.retry_count, 0);
        assert!(action.has_retries_left());
        assert!(action.is_open());
    }

    #[test]
    fn test_failure_exhausts_after_max_retries() {
        let mut action = CompensationAction::new(CompensationType::RefundPayment, 3);

        assert_eq!(action.record_failure("timeout"), CompensationStatus::Pending);
        assert_eq!(action.record_failure("timeout"), CompensationStatus::Pending);
        assert_eq!(action.record_failure("declined"), CompensationStatus::Failed);

        assert_eq!(action.retry_count, 3);
        assert!(!action.has_retries_left());
        assert_eq!(action.last_error.as_deref(), Some("declined"));
    }

    #[test]
    fn test_success_clears_error() {
        let mut action = CompensationAction::new(CompensationType::Notify, 3);
        action.record_failure("broker down");
        action.record_success();

        assert_eq!(action.status, CompensationStatus::Completed);
        assert!(action.last_error.is_none());
        assert!(action.executed_at.is_some());
        assert!(!action.is_open());
    }

    #[test]
    fn test_sweep_failure_does_not_touch_retry_count() {
        let mut action = CompensationAction::new(CompensationType::CancelOrder, 1);
        action.record_failure("down");
        action.record_sweep_failure("still down");

        assert_eq!(action.retry_count, 1);
        assert_eq!(action.sweep_attempts, 1);
        assert_eq!(action.status, CompensationStatus::Failed);
    }

    #[test]
    fn test_type_serializes_under_type_key() {
        let action = CompensationAction::new(CompensationType::ReleaseInventory, 3);
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "release_inventory");
        assert_eq!(json["status"], "pending");
    }
}
