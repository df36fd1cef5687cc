//! Token-bucket rate limiting for outbound provider calls.
//!
//! One bucket is shared by every concurrent caller of the wrapped provider.
//! Callers reserve a token under the mutex and then sleep (outside the lock)
//! until their reservation matures, so waiters are served in arrival order.
//! A caller whose wait would exceed `max_wait` fails with
//! [`FailureKind::RateLimited`](crate::FailureKind::RateLimited) instead.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::ProviderError;
use crate::provider::{Provider, SharedProvider};
use crate::types::{ProviderDescriptor, ProviderResponse, QueryRequest};

/// Rate limit settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window (also the burst size).
    pub requests_per_window: u32,
    /// Window length.
    pub window: Duration,
    /// Longest a caller will wait for a token.
    pub max_wait: Duration,
}

impl RateLimitConfig {
    /// Create a config.
    #[must_use]
    pub fn new(requests_per_window: u32, window: Duration, max_wait: Duration) -> Self {
        Self {
            requests_per_window,
            window,
            max_wait,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    /// Available tokens. Negative values are outstanding reservations.
    tokens: f64,
    last_refill: Instant,
}

/// Shared token bucket.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    /// Tokens added per second.
    refill_rate: f64,
    max_wait: Duration,
    state: Mutex<Bucket>,
}

impl TokenBucket {
    /// Create a full bucket.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity = f64::from(config.requests_per_window.max(1));
        let window = config.window.as_secs_f64().max(f64::EPSILON);
        Self {
            capacity,
            refill_rate: capacity / window,
            max_wait: config.max_wait,
            state: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Reserve a token. Returns how long the caller must wait before using
    /// it, or `None` if that wait exceeds `max_wait` (nothing is reserved).
    fn reserve(&self) -> Option<Duration> {
        let mut bucket = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
        bucket.last_refill = now;

        let remaining = bucket.tokens - 1.0;
        let wait = if remaining >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-remaining / self.refill_rate)
        };
        if wait > self.max_wait {
            return None;
        }
        bucket.tokens = remaining;
        Some(wait)
    }

    /// Wait for a token.
    ///
    /// # Errors
    ///
    /// Returns a retryable `RateLimited` error when the wait would exceed
    /// `max_wait`.
    pub async fn acquire(&self) -> Result<(), ProviderError> {
        match self.reserve() {
            Some(wait) if wait.is_zero() => Ok(()),
            Some(wait) => {
                tracing::debug!(wait_ms = wait.as_millis() as u64, "waiting for rate limit token");
                tokio::time::sleep(wait).await;
                Ok(())
            }
            None => Err(ProviderError::rate_limited(format!(
                "no token available within {}ms",
                self.max_wait.as_millis()
            ))),
        }
    }

    /// Whole tokens currently available.
    #[must_use]
    pub fn available(&self) -> u32 {
        let bucket = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = Instant::now().duration_since(bucket.last_refill).as_secs_f64();
        let tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
        if tokens <= 0.0 { 0 } else { tokens.floor() as u32 }
    }
}

/// Rate-limits calls to the inner provider.
pub struct RateLimited {
    inner: SharedProvider,
    bucket: TokenBucket,
}

impl RateLimited {
    /// Wrap `inner` with a fresh bucket.
    pub fn new(inner: SharedProvider, config: RateLimitConfig) -> Self {
        Self {
            inner,
            bucket: TokenBucket::new(config),
        }
    }

    /// Build a limiter from the provider's declared limits, if it has any.
    ///
    /// Returns `None` when the descriptor declares no request rate.
    pub fn from_descriptor(inner: SharedProvider, max_wait: Duration) -> Option<Self> {
        let limits = &inner.descriptor().limits;
        let requests = limits.requests_per_window?;
        let window = Duration::from_millis(limits.window_ms.unwrap_or(1_000));
        Some(Self::new(
            inner,
            RateLimitConfig::new(requests, window, max_wait),
        ))
    }

    /// The shared bucket.
    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }
}

impl std::fmt::Debug for RateLimited {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimited")
            .field("inner", &self.inner.name())
            .field("bucket", &self.bucket)
            .finish()
    }
}

#[async_trait]
impl Provider for RateLimited {
    fn descriptor(&self) -> &ProviderDescriptor {
        self.inner.descriptor()
    }

    async fn execute(&self, query: &QueryRequest) -> Result<ProviderResponse, ProviderError> {
        if let Err(e) = self.bucket.acquire().await {
            tracing::warn!(provider = self.inner.name(), error = %e, "rate limit exceeded");
            return Err(e);
        }
        self.inner.execute(query).await
    }

    async fn validate(&self) -> bool {
        self.inner.validate().await
    }

    fn estimate_cost(&self, units: u64) -> f64 {
        self.inner.estimate_cost(units)
    }
}
