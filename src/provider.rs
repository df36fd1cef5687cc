//! The provider trait implemented by adapters and resilience decorators.
//!
//! A provider is the unit of work in a fan-out: it executes a
//! [`QueryRequest`] against one external capability source (a search API,
//! a model backend) and returns normalized [`ResultRecord`](crate::ResultRecord)s.
//! Concrete adapters live outside this crate; the core only ever sees
//! `Arc<dyn Provider>` and never branches on concrete provider types.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{ProviderDescriptor, ProviderResponse, QueryRequest};

/// A pluggable search or analysis backend.
///
/// All implementations must be `Send + Sync`: the executor runs each
/// provider in its own task and decorators share inner providers across
/// concurrent callers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Identity, capabilities, pricing, and limits.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Execute a query.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on any failure. Implementations must not
    /// return a partial record list after an internal error.
    async fn execute(&self, query: &QueryRequest) -> Result<ProviderResponse, ProviderError>;

    /// Self-check run at registration time (credentials, reachability).
    ///
    /// Defaults to healthy.
    async fn validate(&self) -> bool {
        true
    }

    /// Estimated cost of consuming `units`.
    ///
    /// Defaults to the descriptor's [`CostModel`](crate::usage::CostModel).
    fn estimate_cost(&self, units: u64) -> f64 {
        self.descriptor().cost_model.cost_for(units)
    }

    /// Cost of a successful `response`.
    ///
    /// Uses the price fixed by whoever served the response, if any,
    /// otherwise [`estimate_cost`](Self::estimate_cost) on its usage.
    fn response_cost(&self, response: &ProviderResponse) -> f64 {
        response
            .cost
            .unwrap_or_else(|| self.estimate_cost(response.usage.units))
    }

    /// Registry key. Shorthand for `descriptor().name`.
    fn name(&self) -> &str {
        &self.descriptor().name
    }
}

/// Shared handle to a provider.
pub type SharedProvider = Arc<dyn Provider>;
