//! Transaction ledger for the checkout saga.
//!
//! A [`Transaction`] row and its [`CompensationAction`] children are the only
//! durable state the saga owns. Stores update rows in place, keyed by
//! transaction ID, with optimistic concurrency via [`Version`].

pub mod compensation;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod status;
pub mod store;
pub mod transaction;
pub mod version;

pub use common::{Money, TransactionId};
pub use compensation::{CompensationAction, CompensationStatus, CompensationType};
pub use error::{LedgerError, Result};
pub use memory::InMemoryTransactionStore;
pub use postgres::PostgresTransactionStore;
pub use status::TransactionStatus;
pub use store::{TransactionStore, TransactionStoreExt};
pub use transaction::{LineItem, PaymentMethod, Transaction};
pub use version::Version;
