//! Circuit breaker for calls into unreliable external dependencies.
//!
//! Each operation name owns an independent circuit:
//!
//! ```text
//! Closed ──(failures >= threshold within window)──► Open
//! Open ──(reset timeout elapsed)──► HalfOpen (single trial call)
//! HalfOpen ──(trial succeeds)──► Closed
//! HalfOpen ──(trial fails)──► Open
//! ```
//!
//! While a circuit is open, or while a half-open trial is in flight, callers
//! receive the fallback without the primary being invoked.

pub mod breaker;
pub mod config;
pub mod error;
pub mod state;

pub use breaker::{BreakerOutcome, CallSource, CircuitBreaker, FallbackReason};
pub use config::BreakerConfig;
pub use error::BreakerError;
pub use state::{CircuitSnapshot, CircuitState};
