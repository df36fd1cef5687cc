//! Per-provider circuit breaker.
//!
//! Tracks consecutive failures of the wrapped provider and temporarily stops
//! calling it once they reach a threshold. After a cooldown, a single trial
//! call is let through; its result closes or re-opens the circuit.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure              │
//!     └─────────────────────────┴──────────────────────┘
//! ```
//!
//! Each breaker belongs to exactly one decorated provider; there is no
//! shared breaker state between providers or orchestrators.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{FailureKind, ProviderError};
use crate::provider::{Provider, SharedProvider};
use crate::types::{ProviderDescriptor, ProviderResponse, QueryRequest};

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Healthy: all calls pass through.
    Closed,
    /// Tripped: calls fail fast until the cooldown expires.
    Open,
    /// Cooldown elapsed: one trial call is allowed.
    HalfOpen,
}

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before tripping to Open.
    pub failure_threshold: u32,
    /// Milliseconds to stay Open before allowing a trial.
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    /// Cooldown as a [`Duration`].
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Wraps a provider with a circuit breaker.
///
/// While the circuit is open, calls fail with
/// [`FailureKind::CircuitOpen`] without contacting the provider; the
/// executor reports those as skipped.
pub struct CircuitBreaker {
    inner: SharedProvider,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Wrap `inner` with a closed breaker.
    pub fn new(inner: SharedProvider, config: CircuitBreakerConfig) -> Self {
        Self {
            inner,
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                trial_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state. An open circuit whose cooldown has elapsed still
    /// reports `Open` until the next call attempts a trial.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Consecutive failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Force the breaker back to Closed.
    pub fn reset(&self) {
        let mut s = self.lock();
        s.state = CircuitState::Closed;
        s.consecutive_failures = 0;
        s.last_failure_at = None;
        s.trial_in_flight = false;
    }

    /// Admit or reject a call. `Some(true)` means this call claimed the
    /// single half-open trial slot; an Open circuit whose cooldown has
    /// elapsed moves to HalfOpen here.
    fn try_acquire(&self) -> Option<bool> {
        let mut s = self.lock();
        match s.state {
            CircuitState::Closed => Some(false),
            CircuitState::HalfOpen if s.trial_in_flight => None,
            CircuitState::HalfOpen => {
                s.trial_in_flight = true;
                Some(true)
            }
            CircuitState::Open => {
                let cooldown_elapsed = s
                    .last_failure_at
                    .is_none_or(|t| t.elapsed() >= self.config.cooldown());
                if !cooldown_elapsed {
                    return None;
                }
                s.state = CircuitState::HalfOpen;
                s.trial_in_flight = true;
                Some(true)
            }
        }
    }

    fn record_success(&self) {
        let mut s = self.lock();
        if s.state != CircuitState::Closed {
            tracing::info!(provider = self.inner.name(), "circuit closed");
        }
        s.state = CircuitState::Closed;
        s.consecutive_failures = 0;
        s.trial_in_flight = false;
    }

    fn record_failure(&self) {
        let mut s = self.lock();
        s.consecutive_failures = s.consecutive_failures.saturating_add(1);
        s.last_failure_at = Some(Instant::now());
        let was_trial = s.state == CircuitState::HalfOpen;
        s.trial_in_flight = false;
        if was_trial || s.consecutive_failures >= self.config.failure_threshold.max(1) {
            if s.state != CircuitState::Open {
                tracing::warn!(
                    provider = self.inner.name(),
                    consecutive_failures = s.consecutive_failures,
                    "circuit opened"
                );
            }
            s.state = CircuitState::Open;
        }
    }
}

/// Holds the half-open trial slot for one call. Dropping it while still
/// held (the call was cancelled, or a nested breaker rejected it) frees the
/// slot for the next call.
struct TrialSlot<'a> {
    breaker: &'a CircuitBreaker,
    held: bool,
}

impl TrialSlot<'_> {
    fn disarm(&mut self) {
        self.held = false;
    }
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        if self.held {
            self.breaker.lock().trial_in_flight = false;
            tracing::debug!(provider = self.breaker.inner.name(), "trial slot released");
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("inner", &self.inner.name())
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

#[async_trait]
impl Provider for CircuitBreaker {
    fn descriptor(&self) -> &ProviderDescriptor {
        self.inner.descriptor()
    }

    async fn execute(&self, query: &QueryRequest) -> Result<ProviderResponse, ProviderError> {
        let Some(trial) = self.try_acquire() else {
            return Err(ProviderError::circuit_open(format!(
                "circuit open for provider '{}'",
                self.inner.name()
            )));
        };
        let mut slot = TrialSlot {
            breaker: self,
            held: trial,
        };
        match self.inner.execute(query).await {
            Ok(response) => {
                slot.disarm();
                self.record_success();
                Ok(response)
            }
            // A nested breaker rejecting the call says nothing about health.
            Err(e) if e.kind == FailureKind::CircuitOpen => Err(e),
            Err(e) => {
                slot.disarm();
                self.record_failure();
                Err(e)
            }
        }
    }

    async fn validate(&self) -> bool {
        self.inner.validate().await
    }

    fn estimate_cost(&self, units: u64) -> f64 {
        self.inner.estimate_cost(units)
    }
}
