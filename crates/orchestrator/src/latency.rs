//! Per-stage latency tracking.

use std::collections::BTreeMap;
use std::time::Duration;

/// Milliseconds spent per named stage. Repeated stages accumulate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatencyTracker {
    stages: BTreeMap<String, u64>,
}

impl LatencyTracker {
    pub fn record(&mut self, stage: &str, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let entry = self.stages.entry(stage.to_string()).or_insert(0);
        *entry = entry.saturating_add(ms);
    }

    pub fn get(&self, stage: &str) -> Option<u64> {
        self.stages.get(stage).copied()
    }

    pub fn into_map(self) -> BTreeMap<String, u64> {
        self.stages
    }
}

/// Returns true if `elapsed` is over `budget`.
pub fn exceeds_budget(elapsed: Duration, budget: Duration) -> bool {
    elapsed > budget
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_stage_accumulates() {
        let mut tracker = LatencyTracker::default();
        tracker.record("session", Duration::from_millis(4));
        tracker.record("session", Duration::from_millis(6));
        tracker.record("retrieval", Duration::from_millis(120));

        assert_eq!(tracker.get("session"), Some(10));
        assert_eq!(tracker.get("generation"), None);
        assert_eq!(tracker.into_map().len(), 2);
    }

    #[test]
    fn test_budget_is_exclusive() {
        let budget = Duration::from_millis(300);
        assert!(!exceeds_budget(Duration::from_millis(300), budget));
        assert!(exceeds_budget(Duration::from_millis(301), budget));
    }
}
