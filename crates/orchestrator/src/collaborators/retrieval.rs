//! Retrieval collaborator: product/knowledge search.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// A retrieved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub snippet: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalQuery {
    pub merchant_id: String,
    pub query: String,
    pub filters: BTreeMap<String, String>,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetrievalResponse {
    pub documents: Vec<Document>,
    /// The engine answered from its cache.
    pub cache_hit: bool,
    /// Model predictions the engine ran (ranking, recommendations).
    pub predictions: u64,
}

#[async_trait]
pub trait RetrievalService: Send + Sync {
    async fn search(&self, query: &RetrievalQuery) -> Result<RetrievalResponse, CollaboratorError>;
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    merchant_id: String,
    document: Document,
    terms: HashSet<String>,
}

#[derive(Debug, Default)]
struct InMemoryRetrievalState {
    catalog: Vec<CatalogEntry>,
    seen_queries: HashSet<(String, String)>,
    calls: u32,
    fail: bool,
    delay: Duration,
}

/// Term-overlap search over an in-memory catalog.
///
/// A query repeated for the same merchant is reported as a cache hit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRetrieval {
    state: Arc<RwLock<InMemoryRetrievalState>>,
}

impl InMemoryRetrieval {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document to a merchant's catalog.
    pub fn add_document(
        &self,
        merchant_id: impl Into<String>,
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) {
        let text = text.into();
        let terms = tokenize(&text);
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .catalog
            .push(CatalogEntry {
                merchant_id: merchant_id.into(),
                document: Document {
                    id: id.into(),
                    snippet: text,
                    score: 0.0,
                    metadata,
                },
                terms,
            });
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).fail = fail;
    }

    /// Delays every search, to exercise timeouts.
    pub fn set_delay(&self, delay: Duration) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).delay = delay;
    }

    pub fn call_count(&self) -> u32 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).calls
    }
}

#[async_trait]
impl RetrievalService for InMemoryRetrieval {
    async fn search(&self, query: &RetrievalQuery) -> Result<RetrievalResponse, CollaboratorError> {
        let delay = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.calls += 1;
            state.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail {
            return Err(CollaboratorError::unavailable(
                "retrieval",
                "Search engine unavailable",
            ));
        }

        let query_terms = tokenize(&query.query);
        let mut documents: Vec<Document> = state
            .catalog
            .iter()
            .filter(|entry| entry.merchant_id == query.merchant_id)
            .filter(|entry| {
                query
                    .filters
                    .iter()
                    .all(|(k, v)| entry.document.metadata.get(k) == Some(v))
            })
            .filter_map(|entry| {
                let matched = entry.terms.intersection(&query_terms).count();
                (matched > 0).then(|| Document {
                    score: matched as f64 / query_terms.len().max(1) as f64,
                    ..entry.document.clone()
                })
            })
            .collect();
        let predictions = documents.len() as u64;
        documents.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        documents.truncate(query.limit);

        let cache_hit = !state
            .seen_queries
            .insert((query.merchant_id.clone(), query.query.to_lowercase()));

        Ok(RetrievalResponse {
            documents,
            cache_hit,
            predictions,
        })
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
