//! Builder for composing resilience decorators.

use std::sync::Arc;
use std::time::Duration;

use crate::observability::EventSink;
use crate::provider::SharedProvider;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::cost::{CostLedger, CostTracked};
use super::fallback::Fallback;
use super::instrument::Instrumented;
use super::rate_limit::{RateLimitConfig, RateLimited};
use super::retry::{RetryPolicy, Retrying};

/// Wraps a provider layer by layer.
///
/// Each method wraps everything built so far, so the last layer added is
/// the outermost and sees the call first.
///
/// # Examples
///
/// ```ignore
/// let provider = ProviderStack::new(adapter)
///     .rate_limited(RateLimitConfig::new(10, Duration::from_secs(1), Duration::from_secs(2)))
///     .retrying(RetryPolicy::default())
///     .circuit_breaker(CircuitBreakerConfig::default())
///     .instrumented(sink)
///     .build();
/// ```
#[must_use]
pub struct ProviderStack {
    current: SharedProvider,
    layers: Vec<&'static str>,
}

impl ProviderStack {
    /// Start from a bare provider.
    pub fn new(base: SharedProvider) -> Self {
        Self {
            current: base,
            layers: Vec::new(),
        }
    }

    fn wrap(mut self, layer: &'static str, provider: SharedProvider) -> Self {
        self.current = provider;
        self.layers.push(layer);
        self
    }

    /// Add a retry layer.
    pub fn retrying(self, policy: RetryPolicy) -> Self {
        let wrapped = Arc::new(Retrying::new(Arc::clone(&self.current), policy));
        self.wrap("retry", wrapped)
    }

    /// Add a token-bucket rate limiter.
    pub fn rate_limited(self, config: RateLimitConfig) -> Self {
        let wrapped = Arc::new(RateLimited::new(Arc::clone(&self.current), config));
        self.wrap("rate_limit", wrapped)
    }

    /// Add a rate limiter from the provider's declared limits. No-op when
    /// the descriptor declares none.
    pub fn declared_rate_limit(self, max_wait: Duration) -> Self {
        match RateLimited::from_descriptor(Arc::clone(&self.current), max_wait) {
            Some(limited) => self.wrap("rate_limit", Arc::new(limited)),
            None => self,
        }
    }

    /// Add a circuit breaker.
    pub fn circuit_breaker(self, config: CircuitBreakerConfig) -> Self {
        let wrapped = Arc::new(CircuitBreaker::new(Arc::clone(&self.current), config));
        self.wrap("circuit_breaker", wrapped)
    }

    /// Fall back to `fallbacks`, in order, when everything built so far fails.
    pub fn with_fallbacks(self, fallbacks: Vec<SharedProvider>) -> Self {
        let wrapped = Arc::new(Fallback::new(Arc::clone(&self.current), fallbacks));
        self.wrap("fallback", wrapped)
    }

    /// Record estimated and actual cost in `ledger`.
    pub fn cost_tracked(self, ledger: Arc<dyn CostLedger>) -> Self {
        let wrapped = Arc::new(CostTracked::new(Arc::clone(&self.current), ledger));
        self.wrap("cost", wrapped)
    }

    /// Emit provider events to `sink`.
    pub fn instrumented(self, sink: Arc<dyn EventSink>) -> Self {
        let wrapped = Arc::new(Instrumented::new(Arc::clone(&self.current), sink));
        self.wrap("instrument", wrapped)
    }

    /// Layer names, innermost first.
    pub fn layers(&self) -> &[&'static str] {
        &self.layers
    }

    /// Finish and return the outermost provider.
    pub fn build(self) -> SharedProvider {
        tracing::debug!(
            provider = self.current.name(),
            layers = ?self.layers,
            "provider stack built"
        );
        self.current
    }
}
