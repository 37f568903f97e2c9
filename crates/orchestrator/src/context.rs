//! Per-request progress shared between the dispatch path and the outer boundary.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::time::Instant;

use crate::cost::CostMeter;
use crate::latency::LatencyTracker;

/// What a request has accumulated so far.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub latencies: LatencyTracker,
    pub usage: CostMeter,
    pub fallback_used: bool,
    pub cache_hit: bool,
    /// Components that were replaced by a fallback, in order.
    pub fallbacks: Vec<&'static str>,
}

/// Collects latencies, usage and fallback flags for one request.
///
/// Lives outside the dispatch future so that partial progress is still
/// reported when dispatch panics.
#[derive(Debug, Default)]
pub struct RequestContext {
    progress: Mutex<Progress>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Progress) -> R) -> R {
        let mut progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut progress)
    }

    /// Awaits `fut` and records its wall-clock time under `stage`.
    pub async fn time<F: Future>(&self, stage: &str, fut: F) -> F::Output {
        let started = Instant::now();
        let output = fut.await;
        self.record_latency(stage, started.elapsed());
        output
    }

    pub fn record_latency(&self, stage: &str, elapsed: std::time::Duration) {
        self.with(|p| p.latencies.record(stage, elapsed));
    }

    pub fn mark_fallback(&self, component: &'static str) {
        metrics::counter!("orchestrator_fallbacks_total", "component" => component).increment(1);
        self.with(|p| {
            p.fallback_used = true;
            p.fallbacks.push(component);
        });
    }

    pub fn mark_cache_hit(&self) {
        self.with(|p| p.cache_hit = true);
    }

    pub fn usage(&self, f: impl FnOnce(&mut CostMeter)) {
        self.with(|p| f(&mut p.usage));
    }

    pub fn snapshot(&self) -> Progress {
        self.with(|p| p.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_time_records_stage() {
        let ctx = RequestContext::new();
        let value = ctx
            .time("retrieval", async {
                tokio::time::sleep(Duration::from_millis(40)).await;
                7
            })
            .await;

        assert_eq!(value, 7);
        assert_eq!(ctx.snapshot().latencies.get("retrieval"), Some(40));
    }

    #[test]
    fn test_fallback_marks_are_kept() {
        let ctx = RequestContext::new();
        ctx.mark_fallback("retrieval");
        ctx.mark_cache_hit();
        ctx.usage(|u| u.add_retrieval_hits(2));

        let progress = ctx.snapshot();
        assert!(progress.fallback_used);
        assert!(progress.cache_hit);
        assert_eq!(progress.fallbacks, vec!["retrieval"]);
        assert_eq!(progress.usage.retrieval_hits, 2);
    }
}
