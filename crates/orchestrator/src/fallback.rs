//! Dependency-free responses used when a collaborator is unavailable.

use uuid::Uuid;

use crate::collaborators::{Generation, RetrievalResponse, Session};

pub const DEGRADED_ANSWER: &str = "Our product assistant is temporarily unavailable. \
     Please try again shortly or browse the catalog directly.";

/// Confidence reported for a fallback answer.
pub const DEGRADED_CONFIDENCE: f64 = 0.1;

pub fn degraded_retrieval() -> RetrievalResponse {
    RetrievalResponse::default()
}

pub fn degraded_generation() -> Generation {
    Generation {
        text: DEGRADED_ANSWER.to_string(),
        confidence: DEGRADED_CONFIDENCE,
        sources: Vec::new(),
        tokens_used: 0,
    }
}

/// A session that is not persisted, keeping the caller's ID if given.
pub fn ephemeral_session(session_id: Option<&str>, merchant_id: &str, user_id: &str) -> Session {
    Session {
        session_id: session_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("ephemeral-{}", Uuid::new_v4())),
        merchant_id: merchant_id.to_string(),
        user_id: user_id.to_string(),
        ephemeral: true,
    }
}

/// Ceiling on answer confidence when retrieval supplied no context.
pub const RETRIEVAL_DEGRADED_MAX_CONFIDENCE: f64 = 0.3;
