//! HTTP route handlers.

pub mod ops;
pub mod orchestrate;
pub mod transactions;

use std::sync::Arc;

use ledger::TransactionStore;
use orchestrator::RequestOrchestrator;
use saga::CheckoutSaga;

/// Shared application state accessible from all handlers.
pub struct AppState<S: TransactionStore> {
    pub orchestrator: RequestOrchestrator<S>,
    /// Same saga the orchestrator routes checkouts to.
    pub saga: Arc<CheckoutSaga<S>>,
}
