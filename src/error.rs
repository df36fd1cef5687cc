//! Error types for switchyard.
//!
//! Two families of errors exist:
//!
//! - [`OrchestratorError`]: structural problems (bad registration, unknown
//!   provider names, empty selections, invalid config). These are returned
//!   synchronously to the caller.
//! - [`ProviderError`]: a failure of one provider during a fan-out. These are
//!   never raised out of [`Orchestrator::execute`](crate::Orchestrator::execute);
//!   the executor captures them as [`Outcome`](crate::Outcome) failures.
//!
//! Every variant carries a stable SCREAMING_SNAKE_CASE code that is part of
//! the `Display` output and available via `code()`.

use std::fmt;

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Registration input or provider self-check was rejected.
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";

    /// A provider name is not registered.
    pub const NOT_FOUND: &str = "NOT_FOUND";

    /// A selection resolved to zero providers.
    pub const NO_PROVIDERS: &str = "NO_PROVIDERS";

    /// Invalid orchestrator configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// A provider did not finish before the shared deadline.
    pub const TIMEOUT: &str = "TIMEOUT";

    /// A rate limiter could not grant a token within its maximum wait.
    pub const RATE_LIMITED: &str = "RATE_LIMITED";

    /// The adapter reported a failure.
    pub const PROVIDER_FAILED: &str = "PROVIDER_FAILED";

    /// A circuit breaker rejected the call without contacting the provider.
    pub const CIRCUIT_OPEN: &str = "CIRCUIT_OPEN";

    /// The provider task panicked.
    pub const PROVIDER_PANICKED: &str = "PROVIDER_PANICKED";
}

/// Structural errors raised synchronously to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    /// Bad registration input or a failed provider self-check.
    #[error("[{}] {}", error_codes::VALIDATION_FAILED, .0)]
    Validation(String),

    /// Unknown provider name.
    #[error("[{}] provider not found: {}", error_codes::NOT_FOUND, .0)]
    NotFound(String),

    /// The selection resolved to no providers and no fallback applied.
    #[error("[{}] {}", error_codes::NO_PROVIDERS, .0)]
    NoProvidersAvailable(String),

    /// Invalid configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),
}

impl OrchestratorError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => error_codes::VALIDATION_FAILED,
            Self::NotFound(_) => error_codes::NOT_FOUND,
            Self::NoProvidersAvailable(_) => error_codes::NO_PROVIDERS,
            Self::Config(_) => error_codes::CONFIG_INVALID,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::NotFound(m)
            | Self::NoProvidersAvailable(m)
            | Self::Config(m) => m,
        }
    }
}

/// Convenience alias for structural results.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Classification of a per-provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The provider exceeded the shared deadline.
    Timeout,
    /// A rate limiter refused to wait any longer for a token.
    RateLimited,
    /// Adapter-reported failure.
    Provider,
    /// A circuit breaker rejected the call.
    CircuitOpen,
    /// The provider task panicked.
    Panicked,
}

impl FailureKind {
    /// Stable code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout => error_codes::TIMEOUT,
            Self::RateLimited => error_codes::RATE_LIMITED,
            Self::Provider => error_codes::PROVIDER_FAILED,
            Self::CircuitOpen => error_codes::CIRCUIT_OPEN,
            Self::Panicked => error_codes::PROVIDER_PANICKED,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::RateLimited => f.write_str("rate_limited"),
            Self::Provider => f.write_str("provider"),
            Self::CircuitOpen => f.write_str("circuit_open"),
            Self::Panicked => f.write_str("panicked"),
        }
    }
}

/// A failure reported by (or on behalf of) a single provider.
///
/// The `retryable` flag is set by whoever produced the error: adapters for
/// [`FailureKind::Provider`], the core for everything else. The retry
/// decorator fills in `attempts`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{}] {}", .kind.code(), .message)]
pub struct ProviderError {
    /// What went wrong.
    pub kind: FailureKind,
    /// Human-readable description.
    pub message: String,
    /// Whether repeating the call may succeed.
    pub retryable: bool,
    /// Number of attempts made before giving up (1 when not retried).
    pub attempts: u32,
}

impl ProviderError {
    /// An adapter-reported failure.
    pub fn provider(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind: FailureKind::Provider,
            message: message.into(),
            retryable,
            attempts: 1,
        }
    }

    /// The provider missed the shared deadline. Always retryable.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: message.into(),
            retryable: true,
            attempts: 1,
        }
    }

    /// A rate limiter refused to wait. Always retryable.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::RateLimited,
            message: message.into(),
            retryable: true,
            attempts: 1,
        }
    }

    /// A circuit breaker rejected the call.
    pub fn circuit_open(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::CircuitOpen,
            message: message.into(),
            retryable: true,
            attempts: 1,
        }
    }

    /// The provider task panicked. Not retryable.
    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Panicked,
            message: message.into(),
            retryable: false,
            attempts: 1,
        }
    }

    /// Replace the attempt count.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Failure inside an external collaborator (event sink, cost ledger).
///
/// Collaborator errors are logged and swallowed; they never fail an
/// orchestration call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("collaborator error: {0}")]
pub struct CollaboratorError(pub String);
