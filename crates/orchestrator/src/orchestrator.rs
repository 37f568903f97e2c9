//! Request routing, breaker protection and result assembly.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use breaker::{BreakerConfig, CircuitBreaker};
use futures_util::FutureExt;
use ledger::TransactionStore;
use rust_decimal::Decimal;
use saga::CheckoutSaga;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::time::{Instant, timeout};

use crate::collaborators::{
    AuditOutcome, AuditRecord, Collaborators, Document, Generation, RetrievalQuery,
    RetrievalResponse, Session, SessionMessage,
};
use crate::config::OrchestratorConfig;
use crate::context::RequestContext;
use crate::cost::CostMeter;
use crate::error::{CollaboratorError, OrchestratorError, Result};
use crate::fallback;
use crate::latency::exceeds_budget;
use crate::request::{
    AnalyticsPayload, ChatPayload, CheckoutPayload, Operation, OperationPayload,
    OrchestrationRequest, SearchPayload, ValidatedRequest,
};
use crate::result::{ChatResponse, OrchestrationResult, SearchResponse, SourceRef};

/// Circuit and latency-stage names.
pub mod components {
    pub const RETRIEVAL: &str = "retrieval";
    pub const GENERATION: &str = "generation";
    pub const SESSION: &str = "session";
    pub const REDACTION: &str = "redaction";
    pub const CHECKOUT: &str = "checkout";
    pub const ANALYTICS: &str = "analytics";
}

use components::{ANALYTICS, CHECKOUT, GENERATION, REDACTION, RETRIEVAL, SESSION};

/// Single entry point for inbound requests.
///
/// Every request produces an [`OrchestrationResult`]: validation failures,
/// collaborator failures and panics inside dispatch are all converted into a
/// well-formed failed result. Retrieval, generation and session calls run
/// through the [`CircuitBreaker`] and degrade to dependency-free fallbacks.
pub struct RequestOrchestrator<S: TransactionStore> {
    breaker: CircuitBreaker,
    collaborators: Collaborators,
    saga: Arc<CheckoutSaga<S>>,
    config: OrchestratorConfig,
}

impl<S: TransactionStore> RequestOrchestrator<S> {
    pub fn new(
        collaborators: Collaborators,
        saga: Arc<CheckoutSaga<S>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            breaker: CircuitBreaker::new(),
            collaborators,
            saga,
            config,
        }
    }

    /// Shares circuit state with another breaker handle.
    pub fn with_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn saga(&self) -> &Arc<CheckoutSaga<S>> {
        &self.saga
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validates, routes, times and costs one request. Never fails.
    #[tracing::instrument(
        skip(self, request),
        fields(request_id = %request.request_id, operation = %request.operation)
    )]
    pub async fn orchestrate(&self, request: OrchestrationRequest) -> OrchestrationResult {
        let started = Instant::now();
        let ctx = RequestContext::new();

        let validated = match request.validate() {
            Ok(validated) => validated,
            Err(error) => {
                tracing::warn!(%error, "Request rejected");
                let hash = request_hash(&request.request_id, &request.payload);
                return self
                    .finish(&request, None, Err(error), &ctx, started, hash)
                    .await;
            }
        };

        let redacted = self.redact(&request.payload, &ctx).await;
        let hash = request_hash(&validated.request_id, &redacted);
        let validated = with_redacted_payload(validated, &redacted);
        ctx.usage(CostMeter::charge_base);

        let outcome = match AssertUnwindSafe(self.dispatch(&validated, &ctx))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                tracing::error!(
                    panic = %panic_message(panic.as_ref()),
                    "Request handling panicked"
                );
                Err(OrchestratorError::Internal(
                    "request handling failed unexpectedly".to_string(),
                ))
            }
        };

        self.finish(&request, Some(validated.operation), outcome, &ctx, started, hash)
            .await
    }

    async fn dispatch(&self, request: &ValidatedRequest, ctx: &RequestContext) -> Result<Value> {
        let data = match &request.payload {
            OperationPayload::Chat(chat) => serde_json::to_value(self.chat(request, chat, ctx).await)?,
            OperationPayload::Search(search) => {
                serde_json::to_value(self.search(request, search, ctx).await)?
            }
            OperationPayload::Checkout(checkout) => self.checkout(request, checkout, ctx).await?,
            OperationPayload::Analytics(analytics) => {
                self.analytics(request, analytics, ctx).await?
            }
        };
        Ok(data)
    }

    async fn chat(
        &self,
        request: &ValidatedRequest,
        chat: &ChatPayload,
        ctx: &RequestContext,
    ) -> ChatResponse {
        let session = ctx.time(SESSION, self.open_session(request, ctx)).await;

        let query = RetrievalQuery {
            merchant_id: request.merchant_id.clone(),
            query: chat.message.clone(),
            filters: chat.filters.clone(),
            limit: self.config.retrieval_limit,
        };
        let (retrieved, retrieval_degraded) =
            ctx.time(RETRIEVAL, self.retrieve(&query, ctx)).await;
        let (answer, generation_degraded) = ctx
            .time(
                GENERATION,
                self.generate(&chat.message, &retrieved.documents, ctx),
            )
            .await;

        if !session.ephemeral {
            ctx.time(
                SESSION,
                self.append_exchange(&session.session_id, &chat.message, &answer.text),
            )
            .await;
        }

        let sources: Vec<SourceRef> = if generation_degraded {
            retrieved.documents.iter().map(SourceRef::from).collect()
        } else {
            retrieved
                .documents
                .iter()
                .filter(|doc| answer.sources.contains(&doc.id))
                .map(SourceRef::from)
                .collect()
        };
        let (confidence, reasoning) = match (retrieval_degraded, generation_degraded) {
            (_, true) => (
                answer.confidence,
                "Assistant unavailable; returned a fallback response".to_string(),
            ),
            (true, false) => (
                answer.confidence.min(fallback::RETRIEVAL_DEGRADED_MAX_CONFIDENCE),
                "Product search unavailable; answered without catalog context".to_string(),
            ),
            (false, false) => (
                answer.confidence,
                format!(
                    "Answer generated from {} retrieved document(s)",
                    retrieved.documents.len()
                ),
            ),
        };

        ChatResponse {
            answer: answer.text,
            sources,
            confidence,
            reasoning,
            session_id: session.session_id,
            degraded: retrieval_degraded || generation_degraded,
        }
    }

    async fn search(
        &self,
        request: &ValidatedRequest,
        search: &SearchPayload,
        ctx: &RequestContext,
    ) -> SearchResponse {
        let query = RetrievalQuery {
            merchant_id: request.merchant_id.clone(),
            query: search.query.clone(),
            filters: search.filters.clone(),
            limit: search.limit.unwrap_or(self.config.retrieval_limit),
        };
        let (retrieved, degraded) = ctx.time(RETRIEVAL, self.retrieve(&query, ctx)).await;

        SearchResponse {
            total: retrieved.documents.len(),
            results: retrieved.documents,
            degraded,
        }
    }

    async fn checkout(
        &self,
        request: &ValidatedRequest,
        checkout: &CheckoutPayload,
        ctx: &RequestContext,
    ) -> Result<Value> {
        let checkout_request = checkout.clone().into_checkout_request(
            &request.merchant_id,
            &request.user_id,
            request.session_id.clone(),
        )?;

        let outcome = ctx.time(CHECKOUT, self.saga.checkout(checkout_request)).await;
        if outcome.is_confirmed() {
            Ok(serde_json::to_value(&outcome)?)
        } else {
            tracing::warn!(
                transaction_id = ?outcome.transaction_id,
                status = ?outcome.status,
                "Checkout did not confirm"
            );
            Err(OrchestratorError::checkout_failed(outcome))
        }
    }

    async fn analytics(
        &self,
        request: &ValidatedRequest,
        analytics: &AnalyticsPayload,
        ctx: &RequestContext,
    ) -> Result<Value> {
        let after = self.config.reporting_timeout;
        let report = ctx
            .time(
                ANALYTICS,
                timeout(
                    after,
                    self.collaborators.reporting.report(
                        &request.merchant_id,
                        &analytics.report,
                        &analytics.parameters,
                    ),
                ),
            )
            .await
            .map_err(|_| CollaboratorError::Timeout {
                collaborator: "reporting",
                after,
            })??;
        Ok(report)
    }

    async fn open_session(&self, request: &ValidatedRequest, ctx: &RequestContext) -> Session {
        let sessions = Arc::clone(&self.collaborators.sessions);
        let requested = request.session_id.as_deref();
        let (session, degraded) = self
            .protected(
                SESSION,
                &self.config.session_breaker,
                move || async move {
                    sessions
                        .get_or_create(requested, &request.merchant_id, &request.user_id)
                        .await
                },
                || fallback::ephemeral_session(requested, &request.merchant_id, &request.user_id),
            )
            .await;
        if degraded {
            ctx.mark_fallback(SESSION);
        }
        session
    }

    async fn append_exchange(&self, session_id: &str, question: &str, answer: &str) {
        for message in [
            SessionMessage::user(question),
            SessionMessage::assistant(answer),
        ] {
            let sessions = Arc::clone(&self.collaborators.sessions);
            let (_, dropped) = self
                .protected(
                    SESSION,
                    &self.config.session_breaker,
                    move || async move { sessions.append(session_id, message).await },
                    || (),
                )
                .await;
            if dropped {
                tracing::debug!(session_id, "Session message not recorded");
            }
        }
    }

    async fn retrieve(
        &self,
        query: &RetrievalQuery,
        ctx: &RequestContext,
    ) -> (RetrievalResponse, bool) {
        let retrieval = Arc::clone(&self.collaborators.retrieval);
        let (response, degraded) = self
            .protected(
                RETRIEVAL,
                &self.config.retrieval_breaker,
                move || async move { retrieval.search(query).await },
                fallback::degraded_retrieval,
            )
            .await;

        if degraded {
            ctx.mark_fallback(RETRIEVAL);
        } else {
            if response.cache_hit {
                ctx.mark_cache_hit();
            }
            let hits = response.documents.len() as u64;
            ctx.usage(|usage| {
                usage.add_retrieval_hits(hits);
                usage.add_predictions(response.predictions);
            });
        }
        (response, degraded)
    }

    async fn generate(
        &self,
        prompt: &str,
        context: &[Document],
        ctx: &RequestContext,
    ) -> (Generation, bool) {
        let generation = Arc::clone(&self.collaborators.generation);
        let (answer, degraded) = self
            .protected(
                GENERATION,
                &self.config.generation_breaker,
                move || async move { generation.complete(prompt, context).await },
                fallback::degraded_generation,
            )
            .await;

        if degraded {
            ctx.mark_fallback(GENERATION);
        } else {
            let tokens = answer.tokens_used;
            ctx.usage(|usage| usage.add_generation_tokens(tokens));
        }
        (answer, degraded)
    }

    /// Runs `primary` through the named circuit. Any failure, including a
    /// closed-circuit failure the breaker hands back, is answered by
    /// `fallback`. Returns the value and whether the fallback supplied it.
    async fn protected<T, P, PFut, F>(
        &self,
        name: &'static str,
        config: &BreakerConfig,
        primary: P,
        fallback: F,
    ) -> (T, bool)
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = std::result::Result<T, CollaboratorError>>,
        F: Fn() -> T,
    {
        let substitute = &fallback;
        let result = self
            .breaker
            .call(name, config, primary, move || async move {
                Ok::<T, CollaboratorError>(substitute())
            })
            .await;

        match result {
            Ok(outcome) if !outcome.used_fallback() => (outcome.into_value(), false),
            Ok(outcome) => {
                tracing::warn!(component = name, "Circuit not admitting calls, using fallback");
                (outcome.into_value(), true)
            }
            Err(error) => {
                tracing::warn!(component = name, %error, "Call failed, using fallback");
                (fallback(), true)
            }
        }
    }

    /// Masks personal data. Falls back to the original payload when the
    /// redactor fails or is slow.
    async fn redact(&self, payload: &Value, ctx: &RequestContext) -> Value {
        let redacted = ctx
            .time(
                REDACTION,
                timeout(
                    self.config.redaction_timeout,
                    self.collaborators.redactor.redact(payload),
                ),
            )
            .await;

        match redacted {
            Ok(Ok(redacted)) => redacted,
            Ok(Err(error)) => {
                tracing::warn!(%error, "Redaction failed, passing payload through");
                payload.clone()
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.config.redaction_timeout,
                    "Redaction timed out, passing payload through"
                );
                payload.clone()
            }
        }
    }

    async fn finish(
        &self,
        request: &OrchestrationRequest,
        operation: Option<Operation>,
        outcome: Result<Value>,
        ctx: &RequestContext,
        started: Instant,
        request_hash: String,
    ) -> OrchestrationResult {
        let elapsed = started.elapsed();
        let progress = ctx.snapshot();
        let operation_label = operation.map_or("invalid", |op| op.as_str());

        let latency_budget_exceeded = exceeds_budget(elapsed, self.config.latency_budget);
        if latency_budget_exceeded {
            metrics::counter!("orchestrator_latency_budget_exceeded_total").increment(1);
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.config.latency_budget.as_millis() as u64,
                "Latency budget exceeded"
            );
        }

        let cost_estimate = operation.map_or(Decimal::ZERO, |op| {
            self.config.cost_model.estimate(op, &progress.usage)
        });

        let (audit_outcome, data, error, error_kind) = match outcome {
            Ok(data) => (AuditOutcome::Success, Some(data), None, None),
            Err(error) => {
                let kind = error.kind();
                let audit_outcome = if matches!(error, OrchestratorError::Validation(_)) {
                    AuditOutcome::Rejected
                } else {
                    AuditOutcome::Failed
                };
                (audit_outcome, error.data(), Some(error.to_string()), Some(kind))
            }
        };

        self.audit(AuditRecord {
            record_id: uuid::Uuid::new_v4(),
            request_id: request.request_id.clone(),
            merchant_id: request.merchant_id.clone(),
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
            operation: operation_label.to_string(),
            outcome: audit_outcome,
            reason: error.clone(),
            request_hash,
            recorded_at: chrono::Utc::now(),
        })
        .await;

        let outcome_label = match audit_outcome {
            AuditOutcome::Success => "success",
            AuditOutcome::Rejected => "rejected",
            AuditOutcome::Failed => "failed",
        };
        metrics::counter!(
            "orchestrator_requests_total",
            "operation" => operation_label,
            "outcome" => outcome_label
        )
        .increment(1);
        metrics::histogram!(
            "orchestrator_request_duration_seconds",
            "operation" => operation_label
        )
        .record(elapsed.as_secs_f64());

        tracing::info!(
            success = error.is_none(),
            elapsed_ms = elapsed.as_millis() as u64,
            fallback_used = progress.fallback_used,
            "Request completed"
        );

        OrchestrationResult {
            request_id: request.request_id.clone(),
            success: error.is_none(),
            data,
            error,
            error_kind,
            execution_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            component_latencies: progress.latencies.into_map(),
            fallback_used: progress.fallback_used,
            cache_hit: progress.cache_hit,
            cost_estimate,
            latency_budget_exceeded,
        }
    }

    /// Records the audit entry. Failures, timeouts and panics are logged only.
    async fn audit(&self, record: AuditRecord) {
        let request_id = record.request_id.clone();
        let recorded = AssertUnwindSafe(timeout(
            self.config.audit_timeout,
            self.collaborators.audit.record(record),
        ))
        .catch_unwind()
        .await;

        match recorded {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(error))) => {
                tracing::warn!(%request_id, %error, "Audit record dropped");
            }
            Ok(Err(_)) => {
                tracing::warn!(%request_id, "Audit record timed out");
            }
            Err(panic) => {
                tracing::error!(
                    %request_id,
                    panic = %panic_message(panic.as_ref()),
                    "Audit sink panicked"
                );
            }
        }
    }
}

/// Lowercase hex SHA-256 over the request id and the payload's JSON text.
pub fn request_hash(request_id: &str, payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(payload.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Re-parses chat, search and analytics payloads from the redacted copy.
/// Checkout keeps the original so payment details reach the gateway intact.
fn with_redacted_payload(mut request: ValidatedRequest, redacted: &Value) -> ValidatedRequest {
    if request.operation == Operation::Checkout {
        return request;
    }
    match OperationPayload::parse(request.operation, redacted) {
        Ok(payload) => request.payload = payload,
        Err(e) => {
            tracing::warn!(
                request_id = %request.request_id,
                operation = %request.operation,
                error = %e,
                "redacted payload unusable, continuing with unredacted payload"
            );
        }
    }
    request
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
