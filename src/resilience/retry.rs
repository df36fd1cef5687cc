//! Retry with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::provider::{Provider, SharedProvider};
use crate::types::{ProviderDescriptor, ProviderResponse, QueryRequest};

/// Attempts per call when `[retry]` leaves `max_attempts` unset.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// First backoff step, in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// Backoff never sleeps longer than this before jitter.
pub const DEFAULT_MAX_DELAY_MS: u64 = 32_000;

/// Growth factor between consecutive backoff steps.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Upper bound of the random jitter, as a fraction of the step.
const JITTER_FRACTION: f64 = 0.1;

/// How [`Retrying`] paces a provider that keeps failing transiently.
///
/// Loaded from the `[retry]` table of the orchestrator config; every key
/// is optional. With the defaults a provider gets three tries, sleeping
/// roughly one then two seconds in between.
///
/// ```
/// use switchyard::resilience::RetryPolicy;
///
/// let policy = RetryPolicy::new().with_max_attempts(5).with_backoff(250, 4_000);
/// assert_eq!(policy.step(3).as_millis(), 1_000);
/// assert_eq!(policy.step(9).as_millis(), 4_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Tries per call, the first one included. `1` means never retry.
    pub max_attempts: u32,
    /// Sleep after the first failed try.
    pub base_delay_ms: u64,
    /// Ceiling for any single sleep.
    pub max_delay_ms: u64,
    /// Each further sleep is the previous one times this.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// First sleep and ceiling, both in milliseconds.
    pub fn with_backoff(mut self, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = backoff_multiplier;
        self
    }

    /// Jitter-free sleep after failed try `attempt` (1-based).
    ///
    /// `base_delay_ms * backoff_multiplier^(attempt - 1)`, held at
    /// `max_delay_ms`. Attempt `0` never failed, so it waits for nothing.
    pub fn step(&self, attempt: u32) -> Duration {
        let Some(exponent) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let grown = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = grown.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// [`step`](Self::step) plus up to 10% random jitter, so providers
    /// that failed together do not retry in lockstep.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let step = self.step(attempt);
        step.mul_f64(1.0 + rand::random::<f64>() * JITTER_FRACTION)
    }

    /// Rejects policies that could never make a call or never stop growing.
    /// The message names the offending `retry.*` key.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".into());
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err("retry.backoff_multiplier must be a finite value >= 1.0".into());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("retry.max_delay_ms must be >= retry.base_delay_ms".into());
        }
        Ok(())
    }
}

/// Retries retryable failures of the inner provider.
///
/// Non-retryable failures pass through after one attempt. When every
/// attempt fails, the last error is returned with `attempts` filled in.
pub struct Retrying {
    inner: SharedProvider,
    policy: RetryPolicy,
}

impl Retrying {
    /// Wrap `inner` with `policy`.
    pub fn new(inner: SharedProvider, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl std::fmt::Debug for Retrying {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrying")
            .field("inner", &self.inner.name())
            .field("policy", &self.policy)
            .finish()
    }
}

#[async_trait]
impl Provider for Retrying {
    fn descriptor(&self) -> &ProviderDescriptor {
        self.inner.descriptor()
    }

    async fn execute(&self, query: &QueryRequest) -> Result<ProviderResponse, ProviderError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.execute(query).await {
                Ok(mut response) => {
                    response.attempts = attempt;
                    return Ok(response);
                }
                Err(e) if e.retryable && attempt < max_attempts => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    tracing::warn!(
                        provider = self.inner.name(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retryable provider failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.with_attempts(attempt)),
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

/// Convenience constructor returning a shared handle.
pub fn retrying(inner: SharedProvider, policy: RetryPolicy) -> SharedProvider {
    Arc::new(Retrying::new(inner, policy))
}
