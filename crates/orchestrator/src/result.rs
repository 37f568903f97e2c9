//! Result envelope and per-operation response bodies.

use std::collections::BTreeMap;

use common::ErrorKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collaborators::Document;

/// Response envelope returned for every request, including failed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResult {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub execution_time_ms: u64,
    /// Wall-clock milliseconds per stage.
    pub component_latencies: BTreeMap<String, u64>,
    pub fallback_used: bool,
    pub cache_hit: bool,
    pub cost_estimate: Decimal,
    pub latency_budget_exceeded: bool,
}

impl OrchestrationResult {
    pub fn is_validation_failure(&self) -> bool {
        self.error_kind == Some(ErrorKind::Validation)
    }
}

/// A retrieved document cited in a chat answer or returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub id: String,
    pub snippet: String,
    pub score: f64,
}

impl From<&Document> for SourceRef {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            snippet: doc.snippet.clone(),
            score: doc.score,
        }
    }
}

/// Body of a chat result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub confidence: f64,
    pub reasoning: String,
    pub session_id: String,
    /// True when a fallback stood in for retrieval or generation.
    pub degraded: bool,
}

/// Body of a search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<Document>,
    pub total: usize,
    pub degraded: bool,
}
