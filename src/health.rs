//! Per-provider health counters and eviction policies.
//!
//! The registry keeps one [`ProviderHealth`] per entry. The executor reports
//! every outcome through the [`HealthRecorder`] callback, which the registry
//! implements. Nothing is evicted automatically: an [`EvictionPolicy`] is
//! applied only when the caller asks via
//! [`Registry::apply_eviction_policy`](crate::Registry::apply_eviction_policy).

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::types::OutcomeKind;

/// Smoothing factor for the rolling error rate.
///
/// Each new outcome contributes 20% of the updated rate, so roughly the
/// last ten calls dominate.
pub const ERROR_RATE_ALPHA: f64 = 0.2;

/// Point-in-time copy of a provider's health counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthSnapshot {
    /// Successful invocations.
    pub success_count: u64,
    /// Failed invocations (including timeouts).
    pub failure_count: u64,
    /// Invocations that were skipped.
    pub skipped_count: u64,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Latency of the most recent invoked call.
    pub last_latency: Option<Duration>,
    /// Exponentially weighted failure rate in `[0, 1]`.
    pub error_rate: f64,
}

impl HealthSnapshot {
    /// Invocations that actually reached the provider.
    pub fn total_calls(&self) -> u64 {
        self.success_count.saturating_add(self.failure_count)
    }
}

/// Mutable health counters for one registry entry.
#[derive(Debug, Default)]
pub struct ProviderHealth {
    inner: Mutex<HealthSnapshot>,
}

impl ProviderHealth {
    /// Fresh, zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one outcome into the counters.
    pub fn record(&self, kind: OutcomeKind, latency: Duration) {
        let mut h = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match kind {
            OutcomeKind::Success => {
                h.success_count = h.success_count.saturating_add(1);
                h.consecutive_failures = 0;
                h.last_latency = Some(latency);
                h.error_rate *= 1.0 - ERROR_RATE_ALPHA;
            }
            OutcomeKind::Failure => {
                h.failure_count = h.failure_count.saturating_add(1);
                h.consecutive_failures = h.consecutive_failures.saturating_add(1);
                h.last_latency = Some(latency);
                h.error_rate = ERROR_RATE_ALPHA + (1.0 - ERROR_RATE_ALPHA) * h.error_rate;
            }
            OutcomeKind::Skipped => {
                h.skipped_count = h.skipped_count.saturating_add(1);
            }
        }
    }

    /// Copy the current counters.
    pub fn snapshot(&self) -> HealthSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Callback the executor invokes after every provider outcome.
pub trait HealthRecorder: Send + Sync {
    /// Record one outcome for `provider`.
    fn record_outcome(&self, provider: &str, kind: OutcomeKind, latency: Duration);
}

/// Decides whether a provider should be removed based on its health.
pub trait EvictionPolicy: Send + Sync {
    /// Return `true` to deregister `provider`.
    fn should_evict(&self, provider: &str, health: &HealthSnapshot) -> bool;
}

/// Evict after `n` consecutive failures.
#[derive(Debug, Clone, Copy)]
pub struct ConsecutiveFailures(pub u32);

impl EvictionPolicy for ConsecutiveFailures {
    fn should_evict(&self, _provider: &str, health: &HealthSnapshot) -> bool {
        self.0 > 0 && health.consecutive_failures >= self.0
    }
}

/// Evict when the rolling error rate exceeds `threshold`, once the provider
/// has been called at least `min_calls` times.
#[derive(Debug, Clone, Copy)]
pub struct ErrorRateAbove {
    /// Error rate above which the provider is evicted.
    pub threshold: f64,
    /// Calls required before the rate is trusted.
    pub min_calls: u64,
}

impl EvictionPolicy for ErrorRateAbove {
    fn should_evict(&self, _provider: &str, health: &HealthSnapshot) -> bool {
        health.total_calls() >= self.min_calls && health.error_rate > self.threshold
    }
}
