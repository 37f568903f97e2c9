//! Health and metrics endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use breaker::{CircuitSnapshot, CircuitState};
use ledger::TransactionStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::routes::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitView {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub trial_in_flight: bool,
}

impl From<CircuitSnapshot> for CircuitView {
    fn from(snapshot: CircuitSnapshot) -> Self {
        Self {
            name: snapshot.name,
            state: snapshot.state,
            failure_count: snapshot.failure_count,
            success_count: snapshot.success_count,
            trial_in_flight: snapshot.trial_in_flight,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `degraded` while any circuit is not closed.
    pub status: &'static str,
    pub circuits: Vec<CircuitView>,
}

/// GET /health — process health and circuit states.
pub async fn health<S: TransactionStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let mut circuits: Vec<CircuitView> = state
        .orchestrator
        .breaker()
        .snapshots()
        .into_iter()
        .map(CircuitView::from)
        .collect();
    circuits.sort_by(|a, b| a.name.cmp(&b.name));

    let status = if circuits.iter().all(|c| c.state == CircuitState::Closed) {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse { status, circuits })
}

/// GET /metrics — returns Prometheus-formatted metrics.
pub async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
