//! Resilience decorators.
//!
//! Every decorator implements [`Provider`](crate::Provider) over an inner
//! `Arc<dyn Provider>` and reports the inner descriptor, so decorated
//! providers register under their original name. Decorators compose in any
//! order; [`ProviderStack`] makes the order explicit.
//!
//! | Decorator | Behaviour |
//! |-----------|-----------|
//! | [`Retrying`] | exponential backoff on retryable failures |
//! | [`Fallback`] | ordered alternates, first success wins |
//! | [`RateLimited`] | shared token bucket with a bounded wait |
//! | [`CircuitBreaker`] | fail fast after repeated failures |
//! | [`CostTracked`] | estimate and reconcile entries in a [`CostLedger`] |
//! | [`Instrumented`] | one [`ProviderEvent`](crate::observability::ProviderEvent) per call |

pub mod circuit_breaker;
pub mod cost;
pub mod fallback;
pub mod instrument;
pub mod rate_limit;
pub mod retry;
pub mod stack;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use cost::{CostLedger, CostTracked, LedgerEntry, LedgerEntryKind, MemoryLedger};
pub use fallback::Fallback;
pub use instrument::Instrumented;
pub use rate_limit::{RateLimitConfig, RateLimited, TokenBucket};
pub use retry::{RetryPolicy, Retrying, retrying};
pub use stack::ProviderStack;
