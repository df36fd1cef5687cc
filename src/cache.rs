//! In-memory result cache for orchestration runs.
//!
//! Caches complete [`Orchestration`]s keyed by the normalized subject, the
//! sorted provider set, the effective limit, and the query constraints.
//! Uses [`moka`] for async-friendly caching with a TTL and bounded
//! capacity. Each [`Orchestrator`](crate::Orchestrator) owns its own cache.

use std::time::Duration;

use moka::future::Cache;

use crate::orchestrator::Orchestration;
use crate::types::QueryRequest;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lowercased, trimmed subject.
    subject: String,
    /// Provider names, sorted.
    providers: Vec<String>,
    /// Effective result limit.
    limit: usize,
    /// Constraints serialized in key order.
    constraints: String,
}

impl CacheKey {
    /// Build a deterministic key.
    ///
    /// `["exa", "brave"]` and `["brave", "exa"]` produce the same key.
    pub fn new<S: AsRef<str>>(query: &QueryRequest, providers: &[S], limit: usize) -> Self {
        let mut providers: Vec<String> = providers.iter().map(|p| p.as_ref().to_owned()).collect();
        providers.sort();
        providers.dedup();
        Self {
            subject: query.subject.trim().to_lowercase(),
            providers,
            limit,
            constraints: serde_json::to_string(&query.constraints).unwrap_or_default(),
        }
    }
}

/// TTL-bounded cache of orchestration results. A TTL of zero disables it.
#[derive(Clone)]
pub struct ResultCache {
    inner: Option<Cache<CacheKey, Orchestration>>,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` runs for `ttl`.
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        if ttl.is_zero() || capacity == 0 {
            return Self::disabled();
        }
        Self {
            inner: Some(
                Cache::builder()
                    .max_capacity(capacity)
                    .time_to_live(ttl)
                    .build(),
            ),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Whether lookups can ever hit.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Look up a run. Returns `None` on miss or when disabled.
    pub async fn get(&self, key: &CacheKey) -> Option<Orchestration> {
        match &self.inner {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    /// Store a run.
    pub async fn insert(&self, key: CacheKey, run: Orchestration) {
        if let Some(cache) = &self.inner {
            cache.insert(key, run).await;
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
