//! Switchyard: pluggable provider orchestration.
//!
//! One logical query (a search or an analysis request) is fanned out to a
//! dynamically registered set of providers. Their answers are merged,
//! deduplicated and ranked into a single result, while cost, health and
//! failure are tracked per provider.
//!
//! # Architecture
//!
//! - **Provider**: the [`Provider`] trait implemented by adapters
//! - **Resilience**: decorators in [`resilience`] (retry, fallback, rate
//!   limit, circuit breaker, cost tracking, instrumentation), each itself a
//!   `Provider`
//! - **Registry**: [`Registry`] owns live providers and their health
//! - **Executor**: [`FanoutExecutor`](orchestrator::FanoutExecutor) runs a
//!   query against many providers concurrently under one deadline
//! - **Aggregator**: [`aggregate`](orchestrator::aggregate) merges and ranks
//! - **Facade**: [`Orchestrator::execute`] ties them together
//!
//! Per-provider failures are reported as [`Outcome`]s and never abort a
//! run. Only structural problems (bad registration, unknown names, empty
//! selections, invalid config) surface as [`OrchestratorError`].

pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod observability;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod types;
pub mod usage;

pub use config::OrchestratorConfig;
pub use error::{CollaboratorError, FailureKind, OrchestratorError, ProviderError, Result};
pub use health::{ConsecutiveFailures, ErrorRateAbove, EvictionPolicy, HealthRecorder, HealthSnapshot};
pub use orchestrator::{Orchestration, Orchestrator, Selection};
pub use provider::{Provider, SharedProvider};
pub use registry::{Registry, RegistryEntry};
pub use types::{
    Outcome, OutcomeKind, OutcomeStatus, ProviderDescriptor, ProviderLimits, ProviderResponse,
    QueryRequest, ResultRecord,
};
pub use usage::{CostModel, Usage};
