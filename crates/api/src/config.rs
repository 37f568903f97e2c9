//! Application configuration loaded from environment variables.

use std::time::Duration;

use orchestrator::OrchestratorConfig;
use saga::SagaConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `json` for structured logs, anything else for human-readable
/// - `DATABASE_URL`: PostgreSQL ledger; the in-memory ledger is used when unset
/// - `LATENCY_BUDGET_MS`, `BREAKER_FAILURE_THRESHOLD`, `BREAKER_RESET_TIMEOUT_MS`,
///   `BREAKER_WINDOW_MS`, `RETRIEVAL_TIMEOUT_MS`, `GENERATION_TIMEOUT_MS`
/// - `COMPENSATION_MAX_RETRIES`, `COMPENSATION_RETRY_DELAY_MS`,
///   `SWEEP_INTERVAL_SECS`, `SWEEP_MAX_ATTEMPTS`, `STALE_COMPENSATION_SECS`
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub latency_budget: Duration,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_timeout: Duration,
    pub breaker_window: Duration,
    pub retrieval_timeout: Duration,
    pub generation_timeout: Duration,
    pub compensation_max_retries: u32,
    pub compensation_retry_delay: Duration,
    pub sweep_interval: Duration,
    pub sweep_max_attempts: u32,
    pub stale_compensation_after: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let millis = |key: &str, default: Duration| {
            Duration::from_millis(number(key, default.as_millis() as u64))
        };
        let count = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            latency_budget: millis("LATENCY_BUDGET_MS", defaults.latency_budget),
            breaker_failure_threshold: count(
                "BREAKER_FAILURE_THRESHOLD",
                defaults.breaker_failure_threshold,
            ),
            breaker_reset_timeout: millis("BREAKER_RESET_TIMEOUT_MS", defaults.breaker_reset_timeout),
            breaker_window: millis("BREAKER_WINDOW_MS", defaults.breaker_window),
            retrieval_timeout: millis("RETRIEVAL_TIMEOUT_MS", defaults.retrieval_timeout),
            generation_timeout: millis("GENERATION_TIMEOUT_MS", defaults.generation_timeout),
            compensation_max_retries: count(
                "COMPENSATION_MAX_RETRIES",
                defaults.compensation_max_retries,
            ),
            compensation_retry_delay: millis(
                "COMPENSATION_RETRY_DELAY_MS",
                defaults.compensation_retry_delay,
            ),
            sweep_interval: Duration::from_secs(number(
                "SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
            sweep_max_attempts: count("SWEEP_MAX_ATTEMPTS", defaults.sweep_max_attempts),
            stale_compensation_after: Duration::from_secs(number(
                "STALE_COMPENSATION_SECS",
                defaults.stale_compensation_after.as_secs(),
            )),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_latency_budget(self.latency_budget)
            .with_breaker_thresholds(
                self.breaker_failure_threshold,
                self.breaker_reset_timeout,
                self.breaker_window,
            )
            .with_retrieval_timeout(self.retrieval_timeout)
            .with_generation_timeout(self.generation_timeout)
    }

    pub fn saga_config(&self) -> SagaConfig {
        SagaConfig::default()
            .with_max_retries(self.compensation_max_retries)
            .with_retry_delay(self.compensation_retry_delay)
            .with_max_sweep_attempts(self.sweep_max_attempts)
            .with_stale_compensation_after(self.stale_compensation_after)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            latency_budget: Duration::from_millis(300),
            breaker_failure_threshold: 5,
            breaker_reset_timeout: Duration::from_secs(30),
            breaker_window: Duration::from_secs(60),
            retrieval_timeout: Duration::from_secs(5),
            generation_timeout: Duration::from_secs(30),
            compensation_max_retries: 3,
            compensation_retry_delay: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(300),
            sweep_max_attempts: 10,
            stale_compensation_after: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.latency_budget, Duration::from_millis(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(from_pairs(&[]), Config::default());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/checkout"),
            ("LATENCY_BUDGET_MS", "150"),
            ("BREAKER_FAILURE_THRESHOLD", "3"),
            ("COMPENSATION_RETRY_DELAY_MS", "250"),
            ("SWEEP_INTERVAL_SECS", "60"),
            ("STALE_COMPENSATION_SECS", "120"),
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/checkout")
        );
        assert_eq!(config.latency_budget, Duration::from_millis(150));
        assert_eq!(config.breaker_failure_threshold, 3);
        assert_eq!(config.compensation_retry_delay, Duration::from_millis(250));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(
            config.saga_config().stale_compensation_after,
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = from_pairs(&[("PORT", "http"), ("SWEEP_MAX_ATTEMPTS", "-1")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.sweep_max_attempts, 10);
    }

    #[test]
    fn test_component_configs() {
        let config = from_pairs(&[("BREAKER_FAILURE_THRESHOLD", "2"), ("RETRIEVAL_TIMEOUT_MS", "750")]);

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.retrieval_breaker.failure_threshold, 2);
        assert_eq!(orchestrator.generation_breaker.failure_threshold, 2);
        assert_eq!(
            orchestrator.retrieval_breaker.call_timeout,
            Some(Duration::from_millis(750))
        );

        let saga = config.saga_config();
        assert_eq!(saga.max_retries, 3);
        assert_eq!(saga.max_sweep_attempts, 10);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
