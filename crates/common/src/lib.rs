//! Shared value types used across the orchestration, ledger and saga crates.

pub mod error;
pub mod money;
pub mod types;

pub use error::ErrorKind;
pub use money::Money;
pub use types::TransactionId;
