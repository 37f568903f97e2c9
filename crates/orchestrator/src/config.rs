use std::time::Duration;

use breaker::BreakerConfig;

use crate::cost::CostModel;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Soft end-to-end target; exceeding it is flagged, never enforced.
    pub latency_budget: Duration,
    pub retrieval_breaker: BreakerConfig,
    pub generation_breaker: BreakerConfig,
    pub session_breaker: BreakerConfig,
    pub redaction_timeout: Duration,
    pub audit_timeout: Duration,
    pub reporting_timeout: Duration,
    /// Documents requested from retrieval when the payload gives no limit.
    pub retrieval_limit: usize,
    pub cost_model: CostModel,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            latency_budget: Duration::from_millis(300),
            retrieval_breaker: BreakerConfig::default().with_call_timeout(Duration::from_secs(5)),
            generation_breaker: BreakerConfig::default().with_call_timeout(Duration::from_secs(30)),
            session_breaker: BreakerConfig::default().with_call_timeout(Duration::from_secs(2)),
            redaction_timeout: Duration::from_millis(500),
            audit_timeout: Duration::from_secs(1),
            reporting_timeout: Duration::from_secs(5),
            retrieval_limit: 5,
            cost_model: CostModel::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_latency_budget(mut self, budget: Duration) -> Self {
        self.latency_budget = budget;
        self
    }

    /// Applies the same thresholds to every breaker-protected collaborator,
    /// keeping each one's call timeout.
    pub fn with_breaker_thresholds(
        mut self,
        failure_threshold: u32,
        reset_timeout: Duration,
        monitoring_window: Duration,
    ) -> Self {
        for cfg in [
            &mut self.retrieval_breaker,
            &mut self.generation_breaker,
            &mut self.session_breaker,
        ] {
            cfg.failure_threshold = failure_threshold;
            cfg.reset_timeout = reset_timeout;
            cfg.monitoring_window = monitoring_window;
        }
        self
    }

    pub fn with_retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.retrieval_breaker.call_timeout = Some(timeout);
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_breaker.call_timeout = Some(timeout);
        self
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }
}
