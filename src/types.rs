//! Core data model: provider descriptors, queries, result records, outcomes.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FailureKind, OrchestratorError, ProviderError};
use crate::usage::{CostModel, Usage};

/// Default result limit for a [`QueryRequest`].
pub const DEFAULT_QUERY_LIMIT: usize = 10;

/// Operational limits a provider declares about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLimits {
    /// Requests allowed per rate window, if the provider is rate limited.
    pub requests_per_window: Option<u32>,
    /// Length of the rate window in milliseconds.
    pub window_ms: Option<u64>,
    /// Maximum context size (tokens, characters) accepted per request.
    pub context_size: Option<u64>,
    /// Maximum number of items per batch request.
    pub max_batch: Option<usize>,
}

/// Immutable description of a provider: identity, capabilities, pricing, limits.
///
/// The `name` is the registry key and must be unique within a
/// [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique registry key.
    pub name: String,
    /// Adapter version string.
    pub version: String,
    /// Named features this provider supports (e.g. `web_search`, `embeddings`).
    pub capabilities: BTreeSet<String>,
    /// How usage maps to cost.
    pub cost_model: CostModel,
    /// Declared operational limits.
    pub limits: ProviderLimits,
}

impl ProviderDescriptor {
    /// Create a descriptor with no capabilities, free pricing, and no limits.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            capabilities: BTreeSet::new(),
            cost_model: CostModel::free(),
            limits: ProviderLimits::default(),
        }
    }

    /// Add a capability.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    /// Set the cost model.
    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    /// Set the limits.
    pub fn with_limits(mut self, limits: ProviderLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Whether this provider claims `capability`.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Checks the descriptor is usable as a registry entry.
    ///
    /// - `name` must be non-empty after trimming and carry no surrounding whitespace
    /// - every capability must be non-empty
    /// - the cost model must have finite, non-negative rates
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.name.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "provider name must not be empty".into(),
            ));
        }
        if self.name.trim() != self.name {
            return Err(OrchestratorError::Validation(format!(
                "provider name '{}' has surrounding whitespace",
                self.name
            )));
        }
        if self.capabilities.iter().any(|c| c.trim().is_empty()) {
            return Err(OrchestratorError::Validation(format!(
                "provider '{}' declares an empty capability",
                self.name
            )));
        }
        if !self.cost_model.is_valid() {
            return Err(OrchestratorError::Validation(format!(
                "provider '{}' has an invalid cost model",
                self.name
            )));
        }
        Ok(())
    }
}

/// One logical request fanned out to providers.
///
/// Owned by the caller and cloned into each provider task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Correlation ID for logs and events.
    pub request_id: Uuid,
    /// What is being searched for or analysed.
    pub subject: String,
    /// Opaque filters passed through to adapters.
    pub constraints: BTreeMap<String, serde_json::Value>,
    /// Desired number of merged results.
    pub limit: usize,
    /// Time budget for the whole fan-out. `None` uses the orchestrator default.
    pub timeout: Option<Duration>,
    /// Expected usage units, used to estimate cost before invocation.
    pub usage_hint: Option<u64>,
}

impl QueryRequest {
    /// Create a query with the default limit and no constraints.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            subject: subject.into(),
            constraints: BTreeMap::new(),
            limit: DEFAULT_QUERY_LIMIT,
            timeout: None,
            usage_hint: None,
        }
    }

    /// Set the result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the fan-out time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.constraints.insert(key.into(), value);
        self
    }

    /// Set the expected usage units.
    pub fn with_usage_hint(mut self, units: u64) -> Self {
        self.usage_hint = Some(units);
        self
    }

    /// Expected usage units, zero when no hint was given.
    pub fn expected_units(&self) -> u64 {
        self.usage_hint.unwrap_or(0)
    }
}

/// Clamp a confidence value into `[0, 1]`. NaN becomes 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A normalized unit of output from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Entity name as reported by the provider.
    pub name: String,
    /// Website or URL identifying the entity, if known.
    pub website: Option<String>,
    /// Provider confidence, always within `[0, 1]`.
    pub confidence: f64,
    /// Name of the provider that produced this record.
    pub source_provider: String,
    /// Free-form attributes. After aggregation this holds the merged mapping.
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Providers that reported this entity. Filled in by the aggregator.
    #[serde(default)]
    pub found_by_providers: Vec<String>,
}

impl ResultRecord {
    /// Create a record; `confidence` is clamped into `[0, 1]`.
    pub fn new(
        name: impl Into<String>,
        source_provider: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            name: name.into(),
            website: None,
            confidence: clamp_confidence(confidence),
            source_provider: source_provider.into(),
            metadata: BTreeMap::new(),
            found_by_providers: Vec::new(),
        }
    }

    /// Set the website.
    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Success payload of a provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Normalized records.
    pub records: Vec<ResultRecord>,
    /// Units consumed.
    pub usage: Usage,
    /// Attempts made, counting the successful one.
    pub attempts: u32,
    /// Whether a fallback provider produced this response.
    pub used_fallback: bool,
    /// Index into the fallback list of the provider that answered.
    pub fallback_index: Option<usize>,
    /// Name of the provider that actually answered, when it differs from
    /// the decorated one.
    pub served_by: Option<String>,
    /// Cost already priced by the provider that answered. Set by
    /// [`Fallback`](crate::resilience::Fallback) when an alternate serves
    /// the call; `None` means "price with the called provider's model".
    #[serde(default)]
    pub cost: Option<f64>,
}

impl ProviderResponse {
    /// A response with no usage and a single attempt.
    pub fn new(records: Vec<ResultRecord>) -> Self {
        Self {
            records,
            usage: Usage::default(),
            attempts: 1,
            used_fallback: false,
            fallback_index: None,
            served_by: None,
            cost: None,
        }
    }

    /// Set the usage.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

/// Coarse outcome classification used for events and health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The provider returned records.
    Success,
    /// The provider failed or timed out.
    Failure,
    /// The provider was not invoked.
    Skipped,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure => f.write_str("failure"),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}

/// What happened to one provider during a fan-out.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    /// The provider answered.
    Success {
        /// The provider's response.
        response: ProviderResponse,
        /// Cost of the reported usage.
        cost: f64,
    },
    /// The provider failed, timed out, or panicked.
    Failure(ProviderError),
    /// The provider was not invoked.
    Skipped {
        /// Why it was skipped.
        reason: String,
    },
}

/// Per-provider result of one executor run.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Name of the provider this outcome belongs to.
    pub provider: String,
    /// Wall time from dispatch to completion (or to the deadline).
    pub latency: Duration,
    /// What happened.
    pub status: OutcomeStatus,
}

impl Outcome {
    /// Coarse classification.
    pub fn kind(&self) -> OutcomeKind {
        match self.status {
            OutcomeStatus::Success { .. } => OutcomeKind::Success,
            OutcomeStatus::Failure(_) => OutcomeKind::Failure,
            OutcomeStatus::Skipped { .. } => OutcomeKind::Skipped,
        }
    }

    /// Whether the provider answered.
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success { .. })
    }

    /// The failure kind, if this outcome is a failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.status {
            OutcomeStatus::Failure(err) => Some(err.kind),
            _ => None,
        }
    }

    /// Records contributed by this outcome (empty unless successful).
    pub fn records(&self) -> &[ResultRecord] {
        match &self.status {
            OutcomeStatus::Success { response, .. } => &response.records,
            _ => &[],
        }
    }

    /// Usage units reported (zero unless successful).
    pub fn units(&self) -> u64 {
        match &self.status {
            OutcomeStatus::Success { response, .. } => response.usage.units,
            _ => 0,
        }
    }

    /// Cost of this outcome (zero unless successful).
    pub fn cost(&self) -> f64 {
        match &self.status {
            OutcomeStatus::Success { cost, .. } => *cost,
            _ => 0.0,
        }
    }
}
