//! Generation collaborator: answer composition by a language model.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::collaborators::Document;
use crate::error::CollaboratorError;

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub confidence: f64,
    /// Document IDs the answer draws on.
    pub sources: Vec<String>,
    pub tokens_used: u64,
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        context: &[Document],
    ) -> Result<Generation, CollaboratorError>;
}

#[derive(Debug, Default)]
struct TemplateGenerationState {
    calls: u32,
    fail: bool,
    delay: Duration,
}

/// Deterministic generator that summarises the supplied context.
#[derive(Debug, Clone, Default)]
pub struct TemplateGeneration {
    state: Arc<RwLock<TemplateGenerationState>>,
}

impl TemplateGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).fail = fail;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).delay = delay;
    }

    pub fn call_count(&self) -> u32 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).calls
    }
}

#[async_trait]
impl GenerationService for TemplateGeneration {
    async fn complete(
        &self,
        prompt: &str,
        context: &[Document],
    ) -> Result<Generation, CollaboratorError> {
        let (fail, delay) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.calls += 1;
            (state.fail, state.delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(CollaboratorError::unavailable(
                "generation",
                "Model endpoint unavailable",
            ));
        }

        let text = if context.is_empty() {
            format!("I could not find products matching \"{prompt}\", but I am happy to help narrow it down.")
        } else {
            let titles: Vec<&str> = context.iter().map(|d| d.snippet.as_str()).collect();
            format!(
                "For \"{prompt}\" I found {} option(s): {}.",
                context.len(),
                titles.join("; ")
            )
        };
        let confidence = (0.4 + 0.1 * context.len() as f64).min(0.95);
        let tokens_used = (prompt.split_whitespace().count() + text.split_whitespace().count()) as u64;

        Ok(Generation {
            text,
            confidence,
            sources: context.iter().map(|d| d.id.clone()).collect(),
            tokens_used,
        })
    }
}
