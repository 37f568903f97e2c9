//! Transaction inspection and compensation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::TransactionId;
use ledger::{Transaction, TransactionStore};
use saga::{CompensationReport, SweepReport};
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::AppState;

const DEFAULT_COMPENSATION_REASON: &str = "manual compensation";

#[derive(Debug, Default, Deserialize)]
pub struct CompensateRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

fn parse_id(id: &str) -> Result<TransactionId, ApiError> {
    TransactionId::parse(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid transaction id: {e}")))
}

/// GET /v1/transactions/{id} — the ledger record.
#[tracing::instrument(skip(state))]
pub async fn get<S: TransactionStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let transaction_id = parse_id(&id)?;
    state
        .saga
        .get_transaction(transaction_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Transaction {transaction_id} not found")))
}

/// POST /v1/transactions/{id}/compensate — reverse a transaction's side effects.
#[tracing::instrument(skip(state, body))]
pub async fn compensate<S: TransactionStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Option<Json<CompensateRequest>>,
) -> Result<Json<CompensationReport>, ApiError> {
    let transaction_id = parse_id(&id)?;
    let reason = body
        .and_then(|Json(req)| req.reason)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_COMPENSATION_REASON.to_string());

    let report = state
        .saga
        .execute_compensation(transaction_id, &reason)
        .await?;
    Ok(Json(report))
}

/// POST /v1/compensations/sweep — run one retry sweep now.
pub async fn sweep<S: TransactionStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<SweepReport>, ApiError> {
    let report = state.saga.retry_failed_compensations().await?;
    Ok(Json(report))
}
