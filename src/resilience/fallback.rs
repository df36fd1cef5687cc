//! Ordered fallback chain.
//!
//! Wraps a primary provider with a list of alternates. Any failure of the
//! primary moves on to the next alternate; the first success wins and is
//! tagged with the index of the alternate that produced it and priced with
//! that alternate's cost model.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::{Provider, SharedProvider};
use crate::types::{ProviderDescriptor, ProviderResponse, QueryRequest};

/// A provider that tries alternates in order when the primary fails.
///
/// The chain reports the primary's descriptor, so it registers under the
/// primary's name. If every provider fails, the last failure is returned.
pub struct Fallback {
    primary: SharedProvider,
    fallbacks: Vec<SharedProvider>,
    /// Count of fallback activations (for observability).
    fallback_count: AtomicU32,
}

impl Fallback {
    /// Create a chain. `fallbacks` are tried in order after `primary`.
    pub fn new(primary: SharedProvider, fallbacks: Vec<SharedProvider>) -> Self {
        Self {
            primary,
            fallbacks,
            fallback_count: AtomicU32::new(0),
        }
    }

    /// Number of times an alternate was consulted.
    pub fn fallback_count(&self) -> u32 {
        self.fallback_count.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Fallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fallbacks: Vec<&str> = self.fallbacks.iter().map(|p| p.name()).collect();
        f.debug_struct("Fallback")
            .field("primary", &self.primary.name())
            .field("fallbacks", &fallbacks)
            .field("fallback_count", &self.fallback_count())
            .finish()
    }
}

#[async_trait]
impl Provider for Fallback {
    fn descriptor(&self) -> &ProviderDescriptor {
        self.primary.descriptor()
    }

    async fn execute(&self, query: &QueryRequest) -> Result<ProviderResponse, ProviderError> {
        let mut last_err = match self.primary.execute(query).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        for (index, fallback) in self.fallbacks.iter().enumerate() {
            self.fallback_count.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                primary = self.primary.name(),
                fallback = fallback.name(),
                fallback_index = index,
                error = %last_err,
                "provider failed, trying fallback"
            );
            match fallback.execute(query).await {
                Ok(mut response) => {
                    response.used_fallback = true;
                    response.fallback_index = Some(index);
                    response.served_by = Some(fallback.name().to_owned());
                    // Priced with the alternate's model, not the primary's.
                    response.cost = Some(fallback.response_cost(&response));
                    return Ok(response);
                }
                Err(e) => last_err = e,
            }
        }

        Err(last_err)
    }

    async fn validate(&self) -> bool {
        self.primary.validate().await
    }

    fn estimate_cost(&self, units: u64) -> f64 {
        self.primary.estimate_cost(units)
    }
}
