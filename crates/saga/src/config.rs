//! Checkout saga configuration.

use std::time::Duration;

/// Retry and timeout settings for the checkout saga.
#[derive(Debug, Clone)]
pub struct SagaConfig {
    /// Attempts the saga itself makes per compensation action.
    pub max_retries: u32,
    /// Delay between compensation attempts.
    pub retry_delay: Duration,
    /// Upper bound for every collaborator call.
    pub step_timeout: Duration,
    /// Attempts the retry sweep makes per action before raising an alert.
    pub max_sweep_attempts: u32,
    /// How long a `compensating` transaction must go without an update
    /// before the retry sweep takes it over. A live run writes after every
    /// attempt, so this must exceed `retry_delay + step_timeout`.
    pub stale_compensation_after: Duration,
}

impl SagaConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn with_max_sweep_attempts(mut self, max_sweep_attempts: u32) -> Self {
        self.max_sweep_attempts = max_sweep_attempts;
        self
    }

    pub fn with_stale_compensation_after(mut self, stale_compensation_after: Duration) -> Self {
        self.stale_compensation_after = stale_compensation_after;
        self
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            step_timeout: Duration::from_secs(10),
            max_sweep_attempts: 10,
            stale_compensation_after: Duration::from_secs(300),
        }
    }
}
