//! Breaker error types.

use std::time::Duration;

use thiserror::Error;

/// Failure of a breaker-protected call.
///
/// The breaker only substitutes the fallback once the circuit is open; a
/// primary failure while closed is handed back to the caller unchanged.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The primary failed while the circuit admitted it.
    #[error("primary call failed: {0}")]
    Primary(E),

    /// The primary did not finish within the configured call timeout.
    #[error("operation '{operation}' timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// The fallback itself failed. There is no second-level fallback.
    #[error("fallback failed: {0}")]
    Fallback(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the error came from the fallback rather than the primary.
    pub fn is_fallback_failure(&self) -> bool {
        matches!(self, BreakerError::Fallback(_))
    }
}
