//! Session collaborator: conversation history.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CollaboratorError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub merchant_id: String,
    pub user_id: String,
    /// Not persisted; stands in while the session store is unavailable.
    #[serde(default)]
    pub ephemeral: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMessage {
    pub role: String,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl SessionMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the named session, creating it (or a new one when no ID is
    /// given) if it does not exist.
    async fn get_or_create(
        &self,
        session_id: Option<&str>,
        merchant_id: &str,
        user_id: &str,
    ) -> Result<Session, CollaboratorError>;

    async fn append(&self, session_id: &str, message: SessionMessage)
    -> Result<(), CollaboratorError>;
}

#[derive(Debug, Default)]
struct InMemorySessionState {
    sessions: HashMap<String, (Session, Vec<SessionMessage>)>,
    fail: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    state: Arc<RwLock<InMemorySessionState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).fail = fail;
    }

    pub fn session_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sessions
            .len()
    }

    pub fn messages(&self, session_id: &str) -> Vec<SessionMessage> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sessions
            .get(session_id)
            .map(|(_, messages)| messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(
        &self,
        session_id: Option<&str>,
        merchant_id: &str,
        user_id: &str,
    ) -> Result<Session, CollaboratorError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail {
            return Err(CollaboratorError::unavailable(
                "session",
                "Session store unavailable",
            ));
        }

        let session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("sess-{}", Uuid::new_v4()));
        let (session, _) = state
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                (
                    Session {
                        session_id,
                        merchant_id: merchant_id.to_string(),
                        user_id: user_id.to_string(),
                        ephemeral: false,
                    },
                    Vec::new(),
                )
            });
        Ok(session.clone())
    }

    async fn append(
        &self,
        session_id: &str,
        message: SessionMessage,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail {
            return Err(CollaboratorError::unavailable(
                "session",
                "Session store unavailable",
            ));
        }
        let (_, messages) = state.sessions.get_mut(session_id).ok_or_else(|| {
            CollaboratorError::InvalidResponse {
                collaborator: "session",
                message: format!("unknown session {session_id}"),
            }
        })?;
        messages.push(message);
        Ok(())
    }
}
