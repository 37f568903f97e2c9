//! Circuit breaker registry keyed by operation name.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::error::BreakerError;
use crate::state::{CircuitSnapshot, CircuitState};

/// Why a call was routed to the fallback without reaching the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The circuit is open and the reset timeout has not elapsed.
    Open,
    /// The circuit is half-open and another caller holds the trial slot.
    TrialInFlight,
}

/// Which function produced the value of a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSource {
    Primary,
    Fallback(FallbackReason),
}

/// Successful result of [`CircuitBreaker::call`].
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerOutcome<T> {
    pub value: T,
    pub source: CallSource,
}

impl<T> BreakerOutcome<T> {
    /// Returns true if the value came from the fallback.
    pub fn used_fallback(&self) -> bool {
        matches!(self.source, CallSource::Fallback(_))
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    window_start: Instant,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Circuit {
    fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            window_start: now,
            opened_at: None,
            trial_in_flight: false,
        }
    }

    fn transition(&mut self, name: &str, to: CircuitState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;

        metrics::gauge!("circuit_breaker_state", "operation" => name.to_string())
            .set(to.gauge_value());
        metrics::counter!(
            "circuit_breaker_transitions_total",
            "operation" => name.to_string(),
            "to" => to.as_str()
        )
        .increment(1);

        match to {
            CircuitState::Open => {
                tracing::warn!(operation = name, %from, failures = self.failure_count, "circuit opened");
            }
            CircuitState::HalfOpen | CircuitState::Closed => {
                tracing::info!(operation = name, %from, %to, "circuit state changed");
            }
        }
    }

    fn snapshot(&self, name: &str) -> CircuitSnapshot {
        CircuitSnapshot {
            name: name.to_string(),
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            window_start: self.window_start,
            opened_at: self.opened_at,
            trial_in_flight: self.trial_in_flight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permit {
    Normal,
    Trial,
}

enum Admission {
    Primary(Permit),
    Reject(FallbackReason),
}

/// Tracks one circuit per operation name and routes calls accordingly.
///
/// All state changes happen under a single mutex that is never held across
/// an `.await`, so concurrent callers cannot lose updates and at most one
/// half-open trial per operation reaches the primary.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreaker {
    circuits: Arc<Mutex<HashMap<String, Circuit>>>,
}

impl CircuitBreaker {
    /// Creates a breaker with no circuits. Circuits are created lazily.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `primary` through the circuit for `name`, or `fallback` if the circuit rejects it.
    ///
    /// A primary failure while the circuit is closed is returned as
    /// [`BreakerError::Primary`] (or [`BreakerError::Timeout`]); the fallback
    /// only answers calls the circuit refuses to admit. A failing fallback is
    /// returned as [`BreakerError::Fallback`].
    pub async fn call<T, E, P, PFut, F, FFut>(
        &self,
        name: &str,
        config: &BreakerConfig,
        primary: P,
        fallback: F,
    ) -> Result<BreakerOutcome<T>, BreakerError<E>>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, E>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, E>>,
    {
        let permit = match self.admit(name, config) {
            Admission::Primary(permit) => permit,
            Admission::Reject(reason) => {
                metrics::counter!("circuit_breaker_rejections_total", "operation" => name.to_string())
                    .increment(1);
                tracing::debug!(operation = name, ?reason, "circuit rejected call, using fallback");
                return fallback()
                    .await
                    .map(|value| BreakerOutcome {
                        value,
                        source: CallSource::Fallback(reason),
                    })
                    .map_err(BreakerError::Fallback);
            }
        };

        let mut guard = TrialGuard {
            breaker: self,
            name,
            armed: permit == Permit::Trial,
        };

        let result = match config.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, primary()).await {
                Ok(inner) => inner.map_err(BreakerError::Primary),
                Err(_) => Err(BreakerError::Timeout {
                    operation: name.to_string(),
                    after: limit,
                }),
            },
            None => primary().await.map_err(BreakerError::Primary),
        };
        guard.armed = false;

        match result {
            Ok(value) => {
                self.record_success(name, permit);
                Ok(BreakerOutcome {
                    value,
                    source: CallSource::Primary,
                })
            }
            Err(err) => {
                self.record_failure(name, config, permit);
                Err(err)
            }
        }
    }

    /// Returns the current state of the circuit for `name`, if it exists.
    pub fn snapshot(&self, name: &str) -> Option<CircuitSnapshot> {
        self.lock().get(name).map(|c| c.snapshot(name))
    }

    /// Returns every known circuit, sorted by name.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let circuits = self.lock();
        let mut all: Vec<_> = circuits.iter().map(|(n, c)| c.snapshot(n)).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Returns the state for `name`, treating an unknown circuit as closed.
    pub fn state(&self, name: &str) -> CircuitState {
        self.snapshot(name).map(|s| s.state).unwrap_or_default()
    }

    /// Forgets the circuit for `name`; the next call starts closed.
    pub fn reset(&self, name: &str) {
        if self.lock().remove(name).is_some() {
            metrics::gauge!("circuit_breaker_state", "operation" => name.to_string())
                .set(CircuitState::Closed.gauge_value());
            tracing::info!(operation = name, "circuit reset");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        match self.circuits.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn admit(&self, name: &str, config: &BreakerConfig) -> Admission {
        let now = Instant::now();
        let mut circuits = self.lock();
        let circuit = circuits
            .entry(name.to_string())
            .or_insert_with(|| Circuit::new(now));

        match circuit.state {
            CircuitState::Closed => Admission::Primary(Permit::Normal),
            CircuitState::Open => {
                let cooled_down = circuit
                    .opened_at
                    .is_none_or(|at| now.duration_since(at) >= config.reset_timeout);
                if cooled_down {
                    circuit.transition(name, CircuitState::HalfOpen);
                    circuit.trial_in_flight = true;
                    Admission::Primary(Permit::Trial)
                } else {
                    Admission::Reject(FallbackReason::Open)
                }
            }
            CircuitState::HalfOpen => {
                if circuit.trial_in_flight {
                    Admission::Reject(FallbackReason::TrialInFlight)
                } else {
                    circuit.trial_in_flight = true;
                    Admission::Primary(Permit::Trial)
                }
            }
        }
    }

    fn record_success(&self, name: &str, permit: Permit) {
        let now = Instant::now();
        let mut circuits = self.lock();
        let Some(circuit) = circuits.get_mut(name) else {
            return;
        };

        match (permit, circuit.state) {
            (Permit::Trial, CircuitState::HalfOpen) => {
                circuit.transition(name, CircuitState::Closed);
                circuit.failure_count = 0;
                circuit.success_count = 0;
                circuit.window_start = now;
                circuit.opened_at = None;
                circuit.trial_in_flight = false;
            }
            (Permit::Normal, CircuitState::Closed) => {
                circuit.failure_count = 0;
                circuit.success_count = circuit.success_count.saturating_add(1);
                circuit.window_start = now;
            }
            // The circuit moved on while this call was in flight.
            (Permit::Trial, _) => circuit.trial_in_flight = false,
            (Permit::Normal, _) => {}
        }
    }

    fn record_failure(&self, name: &str, config: &BreakerConfig, permit: Permit) {
        let now = Instant::now();
        let mut circuits = self.lock();
        let Some(circuit) = circuits.get_mut(name) else {
            return;
        };

        match (permit, circuit.state) {
            (Permit::Trial, CircuitState::HalfOpen) => {
                circuit.transition(name, CircuitState::Open);
                circuit.opened_at = Some(now);
                circuit.success_count = 0;
                circuit.trial_in_flight = false;
            }
            (Permit::Normal, CircuitState::Closed) => {
                // A streak's window opens at its first failure.
                if circuit.failure_count == 0
                    || now.duration_since(circuit.window_start) >= config.monitoring_window
                {
                    circuit.window_start = now;
                    circuit.failure_count = 0;
                }
                circuit.failure_count = circuit.failure_count.saturating_add(1);
                circuit.success_count = 0;
                if circuit.failure_count >= config.threshold() {
                    circuit.opened_at = Some(now);
                    circuit.transition(name, CircuitState::Open);
                }
            }
            (Permit::Trial, _) => circuit.trial_in_flight = false,
            (Permit::Normal, _) => {}
        }
    }

    fn release_trial(&self, name: &str) {
        if let Some(circuit) = self.lock().get_mut(name) {
            circuit.trial_in_flight = false;
        }
    }
}

/// Frees the half-open trial slot if the trial future is dropped mid-flight.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    name: &'a str,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(operation = self.name, "half-open trial abandoned");
            self.breaker.release_trial(self.name);
        }
    }
}
