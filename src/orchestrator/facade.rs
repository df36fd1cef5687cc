//! The orchestrator facade: resolve, fan out, aggregate.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::{CacheKey, ResultCache};
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::observability::{EventSink, FIELD_CAPABILITY};
use crate::provider::SharedProvider;
use crate::registry::Registry;
use crate::resilience::ProviderStack;
use crate::types::{Outcome, OutcomeKind, QueryRequest, ResultRecord};

use super::dedup::aggregate;
use super::fanout::FanoutExecutor;

/// Which providers a query should go to.
///
/// Resolution order:
///
/// 1. explicit `names` (every name must be registered), narrowed by
///    `capability` if both are given
/// 2. otherwise every provider with `capability`
/// 3. otherwise the registry's default set
/// 4. if that resolves to nothing, the configured `fallback_capability`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Explicit provider names. An empty list counts as unset.
    pub names: Option<Vec<String>>,
    /// Required capability.
    pub capability: Option<String>,
}

impl Selection {
    /// Use the registry's default set.
    pub fn defaults() -> Self {
        Self::default()
    }

    /// Select providers by name.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Some(names.into_iter().map(Into::into).collect()),
            capability: None,
        }
    }

    /// Select every provider with `capability`.
    pub fn capability(capability: impl Into<String>) -> Self {
        Self {
            names: None,
            capability: Some(capability.into()),
        }
    }

    /// Narrow by capability.
    #[must_use]
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }
}

/// Result of one orchestration call.
#[derive(Debug, Clone, PartialEq)]
pub struct Orchestration {
    /// Correlation ID of the query.
    pub request_id: Uuid,
    /// Merged, deduplicated, ranked records.
    pub results: Vec<ResultRecord>,
    /// One outcome per selected provider, in selection order.
    pub outcomes: Vec<Outcome>,
    /// Whether this run was served from the result cache.
    pub from_cache: bool,
}

impl Orchestration {
    /// The outcome for `provider`, if it was selected.
    pub fn outcome(&self, provider: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.provider == provider)
    }

    /// Number of outcomes of `kind`.
    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.outcomes.iter().filter(|o| o.kind() == kind).count()
    }

    /// Whether every selected provider succeeded.
    pub fn all_succeeded(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(Outcome::is_success)
    }

    /// Sum of outcome costs.
    pub fn total_cost(&self) -> f64 {
        self.outcomes.iter().map(Outcome::cost).sum()
    }
}

/// Registry, executor and aggregator behind one entry point.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use switchyard::{Orchestrator, OrchestratorConfig, QueryRequest, Registry, Selection};
///
/// # async fn demo() -> switchyard::Result<()> {
/// let registry = Arc::new(Registry::new());
/// // registry.register(...).await?;
/// let orchestrator = Orchestrator::new(registry, OrchestratorConfig::default())?;
/// let run = orchestrator
///     .execute(&QueryRequest::new("payments companies"), &Selection::capability("web_search"))
///     .await?;
/// for record in &run.results {
///     println!("{} ({:.2})", record.name, record.confidence);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    registry: Arc<Registry>,
    config: OrchestratorConfig,
    executor: FanoutExecutor,
    cache: ResultCache,
}

impl Orchestrator {
    /// Create an orchestrator over `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] if `config` is invalid.
    pub fn new(registry: Arc<Registry>, config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let executor = FanoutExecutor::new().with_health_recorder(registry.clone());
        let cache = ResultCache::new(config.cache_capacity, config.cache_ttl());
        Ok(Self {
            registry,
            config,
            executor,
            cache,
        })
    }

    /// Emit one [`ProviderEvent`](crate::observability::ProviderEvent) per
    /// outcome to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.executor = self.executor.with_event_sink(sink);
        self
    }

    /// The registry this orchestrator resolves against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Wrap `provider` with the configured retry policy and circuit breaker.
    ///
    /// The breaker sits outside the retry loop, so one exhausted retry
    /// sequence counts as one breaker failure.
    pub fn decorate(&self, provider: SharedProvider) -> SharedProvider {
        ProviderStack::new(provider)
            .retrying(self.config.retry.clone())
            .circuit_breaker(self.config.circuit_breaker.clone())
            .build()
    }

    /// Resolve `selection` to providers.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::NotFound`] for an unregistered explicit name
    /// - [`OrchestratorError::NoProvidersAvailable`] when nothing matches
    pub fn resolve(&self, selection: &Selection) -> Result<Vec<SharedProvider>> {
        let explicit = selection.names.as_ref().filter(|names| !names.is_empty());

        let mut providers = match (explicit, selection.capability.as_deref()) {
            (Some(names), capability) => {
                let mut seen = HashSet::new();
                let mut providers = Vec::with_capacity(names.len());
                for name in names {
                    if !seen.insert(name.as_str()) {
                        continue;
                    }
                    let provider = self.registry.get(name)?;
                    if capability.is_none_or(|c| provider.descriptor().has_capability(c)) {
                        providers.push(provider);
                    }
                }
                providers
            }
            (None, Some(capability)) => self.registry.by_capability(capability),
            (None, None) => self.registry.default_providers(),
        };

        if providers.is_empty() {
            if let Some(fallback) = self.config.fallback_capability.as_deref() {
                tracing::debug!(capability = fallback, "selection empty, using fallback capability");
                providers = self.registry.by_capability(fallback);
            }
        }

        if providers.is_empty() {
            return Err(OrchestratorError::NoProvidersAvailable(describe(selection)));
        }
        Ok(providers)
    }

    /// Fan `query` out to the providers `selection` resolves to.
    ///
    /// Per-provider failures never surface as errors: an empty result list
    /// with every outcome failed is a valid return.
    ///
    /// # Errors
    ///
    /// Only selection errors, see [`resolve`](Self::resolve).
    pub async fn execute(&self, query: &QueryRequest, selection: &Selection) -> Result<Orchestration> {
        let providers = self.resolve(selection)?;
        let span = crate::orchestrate_span!(query.request_id, providers.len());
        if let Some(capability) = selection.capability.as_deref() {
            span.record(FIELD_CAPABILITY, capability);
        }
        self.run(query, providers).instrument(span).await
    }

    async fn run(&self, query: &QueryRequest, providers: Vec<SharedProvider>) -> Result<Orchestration> {
        tracing::trace!(subject = %query.subject, "orchestrating query");
        let limit = query.limit.min(self.config.max_results);
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        let key = CacheKey::new(query, &names, limit);

        if let Some(mut hit) = self.cache.get(&key).await {
            tracing::debug!(results = hit.results.len(), "serving cached orchestration");
            hit.request_id = query.request_id;
            hit.from_cache = true;
            return Ok(hit);
        }

        let timeout = query.timeout.unwrap_or_else(|| self.config.default_timeout());
        let deadline = deadline_after(timeout);
        let outcomes = self.executor.run(query, &providers, deadline).await;
        let results = aggregate(&outcomes, limit);

        let run = Orchestration {
            request_id: query.request_id,
            results,
            outcomes,
            from_cache: false,
        };
        tracing::debug!(
            succeeded = run.count(OutcomeKind::Success),
            failed = run.count(OutcomeKind::Failure),
            skipped = run.count(OutcomeKind::Skipped),
            results = run.results.len(),
            "orchestration finished"
        );

        if run.all_succeeded() {
            self.cache.insert(key, run.clone()).await;
        }
        Ok(run)
    }

    /// Drop all cached runs.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.registry.len())
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Deadline used when `now + timeout` would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// `now + timeout`, saturating at [`FAR_FUTURE`] for oversized timeouts
/// such as `Duration::MAX`.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout.min(FAR_FUTURE)).unwrap_or(now)
}

fn describe(selection: &Selection) -> String {
    match (&selection.names, &selection.capability) {
        (Some(names), Some(cap)) if !names.is_empty() => {
            format!("none of {names:?} provide capability '{cap}'")
        }
        (_, Some(cap)) => format!("no provider offers capability '{cap}'"),
        _ => "no providers registered for the default selection".into(),
    }
}
