//! Orchestration endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use ledger::TransactionStore;
use orchestrator::{OrchestrationRequest, OrchestrationResult};

use crate::error::ApiError;
use crate::routes::AppState;

/// POST /v1/orchestrate — validate, route and answer one request.
///
/// Always answers with a result envelope; validation failures use 422.
pub async fn orchestrate<S: TransactionStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<OrchestrationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrchestrationResult>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let result = state.orchestrator.orchestrate(request).await;
    let status = if result.is_validation_failure() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)))
}
