//! Breaker configuration.

use std::time::Duration;

/// Thresholds controlling when a circuit opens and how it recovers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Failures inside one monitoring window that trip the circuit. Values below 1 act as 1.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a half-open trial is allowed.
    pub reset_timeout: Duration,
    /// Length of the window in which consecutive failures are counted.
    pub monitoring_window: Duration,
    /// Upper bound on a single primary call. Expiry counts as a failure.
    pub call_timeout: Option<Duration>,
}

impl BreakerConfig {
    pub fn new(failure_threshold: u32, reset_timeout: Duration, monitoring_window: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            monitoring_window,
            call_timeout: None,
        }
    }

    /// Returns a copy with the given per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub(crate) fn threshold(&self) -> u32 {
        self.failure_threshold.max(1)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            monitoring_window: Duration::from_secs(60),
            call_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.reset_timeout, Duration::from_secs(30));
        assert!(config.call_timeout.is_none());
    }

    #[test]
    fn test_zero_threshold_acts_as_one() {
        let config = BreakerConfig::new(0, Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(config.threshold(), 1);
    }
}
