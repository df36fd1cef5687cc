//! Orchestrator configuration with sensible defaults.
//!
//! [`OrchestratorConfig`] controls the default fan-out deadline, result
//! limits, caching, and the resilience defaults used by
//! [`Orchestrator::decorate`](crate::Orchestrator::decorate). It can be
//! built in code or loaded from TOML; missing keys take their defaults.
//!
//! ```toml
//! default_timeout_ms = 5000
//! max_results = 25
//! fallback_capability = "web_search"
//!
//! [retry]
//! max_attempts = 2
//!
//! [circuit_breaker]
//! failure_threshold = 5
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};
use crate::resilience::{CircuitBreakerConfig, RetryPolicy};

/// Largest accepted `default_timeout_ms` (one day).
pub const MAX_DEFAULT_TIMEOUT_MS: u64 = 86_400_000;

/// Configuration for an [`Orchestrator`](crate::Orchestrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Fan-out deadline used when a query carries no timeout.
    pub default_timeout_ms: u64,
    /// Upper bound on merged results, whatever the query asks for.
    pub max_results: usize,
    /// How long to cache complete runs. Set to 0 to disable caching.
    pub cache_ttl_seconds: u64,
    /// Maximum number of cached runs.
    pub cache_capacity: u64,
    /// Capability tried when a selection resolves to nothing.
    pub fallback_capability: Option<String>,
    /// Retry policy applied by `Orchestrator::decorate`.
    pub retry: RetryPolicy,
    /// Circuit breaker settings applied by `Orchestrator::decorate`.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 10_000,
            max_results: 50,
            cache_ttl_seconds: 0,
            cache_capacity: 256,
            fallback_capability: None,
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Default deadline as a [`Duration`].
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Cache TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `default_timeout_ms` must be greater than 0 and at most one day
    /// - `max_results` must be greater than 0
    /// - `cache_capacity` must be greater than 0 when caching is enabled
    /// - `fallback_capability`, if set, must not be blank
    /// - `retry` and `circuit_breaker` must be well formed
    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_ms == 0 {
            return Err(OrchestratorError::Config(
                "default_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.default_timeout_ms > MAX_DEFAULT_TIMEOUT_MS {
            return Err(OrchestratorError::Config(format!(
                "default_timeout_ms must not exceed {MAX_DEFAULT_TIMEOUT_MS}"
            )));
        }
        if self.max_results == 0 {
            return Err(OrchestratorError::Config(
                "max_results must be greater than 0".into(),
            ));
        }
        if self.cache_ttl_seconds > 0 && self.cache_capacity == 0 {
            return Err(OrchestratorError::Config(
                "cache_capacity must be greater than 0 when cache_ttl_seconds is set".into(),
            ));
        }
        if self
            .fallback_capability
            .as_deref()
            .is_some_and(|c| c.trim().is_empty())
        {
            return Err(OrchestratorError::Config(
                "fallback_capability must not be blank".into(),
            ));
        }
        self.retry.validate().map_err(OrchestratorError::Config)?;
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(OrchestratorError::Config(
                "circuit_breaker.failure_threshold must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] on syntax errors, unknown value
    /// types, or failed validation.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| OrchestratorError::Config(format!("invalid config TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] if the file cannot be read or
    /// its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "orchestrator config loaded");
        Ok(config)
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| OrchestratorError::Config(format!("cannot serialize config: {e}")))
    }
}
