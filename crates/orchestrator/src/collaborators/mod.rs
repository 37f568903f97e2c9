//! External collaborators the orchestrator calls.

pub mod audit;
pub mod generation;
pub mod redaction;
pub mod reporting;
pub mod retrieval;
pub mod session;

use std::sync::Arc;

pub use audit::{AuditOutcome, AuditRecord, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use generation::{Generation, GenerationService, TemplateGeneration};
pub use redaction::{BasicPiiRedactor, PiiRedactor};
pub use reporting::{InMemoryReporting, ReportingService};
pub use retrieval::{Document, InMemoryRetrieval, RetrievalQuery, RetrievalResponse, RetrievalService};
pub use session::{InMemorySessionStore, Session, SessionMessage, SessionStore};

/// The collaborators an orchestrator is constructed with.
#[derive(Clone)]
pub struct Collaborators {
    pub retrieval: Arc<dyn RetrievalService>,
    pub generation: Arc<dyn GenerationService>,
    pub sessions: Arc<dyn SessionStore>,
    pub redactor: Arc<dyn PiiRedactor>,
    pub audit: Arc<dyn AuditSink>,
    pub reporting: Arc<dyn ReportingService>,
}

/// Handles to the in-memory collaborators behind [`Collaborators::in_memory`].
#[derive(Clone, Default)]
pub struct InMemoryCollaborators {
    pub retrieval: InMemoryRetrieval,
    pub generation: TemplateGeneration,
    pub sessions: InMemorySessionStore,
    pub redactor: BasicPiiRedactor,
    pub audit: InMemoryAuditSink,
    pub reporting: InMemoryReporting,
}

impl Collaborators {
    /// Builds collaborators backed by in-memory implementations and returns
    /// handles for seeding data and injecting failures.
    pub fn in_memory() -> (Self, InMemoryCollaborators) {
        let handles = InMemoryCollaborators::default();
        let collaborators = Self {
            retrieval: Arc::new(handles.retrieval.clone()),
            generation: Arc::new(handles.generation.clone()),
            sessions: Arc::new(handles.sessions.clone()),
            redactor: Arc::new(handles.redactor.clone()),
            audit: Arc::new(handles.audit.clone()),
            reporting: Arc::new(handles.reporting.clone()),
        };
        (collaborators, handles)
    }
}
