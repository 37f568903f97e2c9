//! HTTP host for the commerce orchestration core.
//!
//! Exposes the request orchestrator, transaction inspection and manual
//! compensation over REST, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use ledger::TransactionStore;
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{Collaborators, InMemoryCollaborators, RequestOrchestrator};
use saga::{CheckoutSaga, CheckoutServices, InMemoryServices};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: TransactionStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health::<S>))
        .route("/v1/orchestrate", post(routes::orchestrate::orchestrate::<S>))
        .route("/v1/transactions/{id}", get(routes::transactions::get::<S>))
        .route(
            "/v1/transactions/{id}/compensate",
            post(routes::transactions::compensate::<S>),
        )
        .route(
            "/v1/compensations/sweep",
            post(routes::transactions::sweep::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Handles to the in-memory collaborators wired into a default state.
#[derive(Clone)]
pub struct InMemoryHandles {
    pub services: InMemoryServices,
    pub collaborators: InMemoryCollaborators,
}

/// Creates application state over `store` with in-memory collaborators.
pub fn create_default_state<S: TransactionStore + 'static>(
    store: S,
    config: &Config,
) -> (Arc<AppState<S>>, InMemoryHandles) {
    let (services, service_handles) = CheckoutServices::in_memory();
    let saga = Arc::new(CheckoutSaga::new(store, services, config.saga_config()));

    let (collaborators, collaborator_handles) = Collaborators::in_memory();
    let orchestrator =
        RequestOrchestrator::new(collaborators, Arc::clone(&saga), config.orchestrator_config());

    let state = Arc::new(AppState { orchestrator, saga });
    let handles = InMemoryHandles {
        services: service_handles,
        collaborators: collaborator_handles,
    };
    (state, handles)
}
