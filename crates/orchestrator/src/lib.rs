//! Request orchestration for conversational commerce.
//!
//! [`RequestOrchestrator::orchestrate`] validates an inbound
//! [`OrchestrationRequest`], masks personal data, and routes it:
//!
//! - `chat`: session, retrieval and generation, each behind a circuit breaker
//! - `search`: retrieval behind a circuit breaker
//! - `checkout`: the checkout saga
//! - `analytics`: the reporting collaborator, bounded by a timeout
//!
//! Every request yields an [`OrchestrationResult`] with per-stage latencies,
//! a cost estimate and fallback flags, and leaves one audit record.

pub mod collaborators;
pub mod config;
pub mod context;
pub mod cost;
pub mod error;
pub mod fallback;
pub mod latency;
pub mod orchestrator;
pub mod request;
pub mod result;

pub use collaborators::{Collaborators, InMemoryCollaborators};
pub use config::OrchestratorConfig;
pub use cost::{CostMeter, CostModel, CostRates};
pub use error::{CollaboratorError, OrchestratorError, Result};
pub use orchestrator::{RequestOrchestrator, components, request_hash};
pub use request::{Operation, OperationPayload, OrchestrationRequest};
pub use result::{ChatResponse, OrchestrationResult, SearchResponse, SourceRef};
