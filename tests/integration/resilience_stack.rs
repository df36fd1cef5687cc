//! Resilience decorators composed around scripted providers and driven
//! through the orchestrator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use switchyard::observability::MemorySink;
use switchyard::resilience::{
    CircuitBreakerConfig, CircuitState, CircuitBreaker, Fallback, LedgerEntryKind, MemoryLedger,
    ProviderStack, RateLimitConfig, RetryPolicy,
};
use switchyard::{
    CostModel, FailureKind, OrchestratorConfig, Orchestrator, OutcomeStatus, Provider,
    ProviderDescriptor, ProviderError, ProviderLimits, ProviderResponse, QueryRequest, Registry,
    Selection, SharedProvider, Usage,
};

use crate::helpers::{MockProvider, Script, init_tracing, record};

/// Fails `failures` times with a retryable error, then succeeds.
struct Recovering {
    descriptor: ProviderDescriptor,
    failures: u32,
    calls: AtomicU32,
}

impl Recovering {
    fn new(name: &str, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            descriptor: ProviderDescriptor::new(name, "1.0").with_capability("search"),
            failures,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Provider for Recovering {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _query: &QueryRequest) -> Result<ProviderResponse, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(ProviderError::provider("502 bad gateway", true));
        }
        Ok(ProviderResponse::new(vec![record("Acme", Some("acme.io"), self.name(), 0.6)])
            .with_usage(Usage::new(500)))
    }
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new()
        .with_max_attempts(max_attempts)
        .with_backoff(1, 5)
}

async fn run_single(provider: SharedProvider) -> switchyard::Orchestration {
    init_tracing();
    let registry = Arc::new(Registry::new());
    let name = provider.name().to_owned();
    registry.register(provider).await.expect("register");
    Orchestrator::new(registry, OrchestratorConfig::default())
        .expect("config")
        .execute(&QueryRequest::new("q"), &Selection::names([name]))
        .await
        .expect("execute")
}

// ─── Fallback ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn non_retryable_primary_failure_uses_first_fallback() {
    let primary = MockProvider::failing("primary", "search", false);
    let backup = MockProvider::returning("backup", "search", vec![record("Acme", None, "backup", 0.5)]);
    let chain = Fallback::new(primary.clone(), vec![backup.clone()]);

    let response = chain.execute(&QueryRequest::new("q")).await.expect("fallback");
    assert!(response.used_fallback);
    assert_eq!(response.fallback_index, Some(0));
    assert_eq!(response.records.len(), 1);
    assert_eq!(primary.calls(), 1);
    assert_eq!(backup.calls(), 1);
    assert_eq!(chain.fallback_count(), 1);
}

#[tokio::test]
async fn fallback_chain_exhausted_returns_last_error() {
    let chain = Fallback::new(
        MockProvider::failing("primary", "search", false),
        vec![
            MockProvider::failing("second", "search", true),
            MockProvider::new(
                ProviderDescriptor::new("third", "1.0"),
                Script::Fail(ProviderError::rate_limited("quota")),
            ),
        ],
    );
    let err = chain.execute(&QueryRequest::new("q")).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::RateLimited);
}

// ─── Retry ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn retry_recovers_inside_an_orchestrated_run() {
    let base = Recovering::new("recovering", 2);
    let provider = ProviderStack::new(base.clone()).retrying(fast_retry(3)).build();

    let run = run_single(provider).await;
    match &run.outcomes[0].status {
        OutcomeStatus::Success { response, .. } => assert_eq!(response.attempts, 3),
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(base.calls.load(Ordering::SeqCst), 3);
    assert_eq!(run.results[0].name, "Acme");
}

#[tokio::test]
async fn retry_gives_up_and_reports_attempts() {
    let base = Recovering::new("stubborn", 10);
    let provider = ProviderStack::new(base.clone()).retrying(fast_retry(2)).build();

    let run = run_single(provider).await;
    match &run.outcomes[0].status {
        OutcomeStatus::Failure(e) => {
            assert_eq!(e.attempts, 2);
            assert!(e.retryable);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(base.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn non_retryable_failure_is_not_retried() {
    let base = MockProvider::failing("fatal", "search", false);
    let provider = ProviderStack::new(base.clone()).retrying(fast_retry(5)).build();
    let run = run_single(provider).await;
    assert_eq!(run.outcomes[0].failure_kind(), Some(FailureKind::Provider));
    assert_eq!(base.calls(), 1);
}

// ─── Rate limiting ───────────────────────────────────────────────────────────

#[tokio::test]
async fn declared_rate_limit_rejects_bursts_beyond_max_wait() {
    let base = MockProvider::new(
        ProviderDescriptor::new("limited", "1.0")
            .with_capability("search")
            .with_limits(ProviderLimits {
                requests_per_window: Some(1),
                window_ms: Some(60_000),
                ..Default::default()
            }),
        Script::Records {
            records: vec![],
            delay: Duration::ZERO,
            units: 0,
        },
    );
    let stack = ProviderStack::new(base.clone()).declared_rate_limit(Duration::ZERO);
    assert_eq!(stack.layers(), &["rate_limit"]);
    let provider = stack.build();

    let query = QueryRequest::new("q");
    assert!(provider.execute(&query).await.is_ok());
    let err = provider.execute(&query).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::RateLimited);
    assert!(err.retryable);
    assert_eq!(base.calls(), 1);
}

#[tokio::test]
async fn rate_limiter_waits_when_within_max_wait() {
    let base = MockProvider::returning("paced", "search", vec![]);
    let provider = ProviderStack::new(base.clone())
        .rate_limited(RateLimitConfig::new(
            1,
            Duration::from_millis(50),
            Duration::from_secs(1),
        ))
        .build();

    let query = QueryRequest::new("q");
    let started = tokio::time::Instant::now();
    provider.execute(&query).await.expect("first");
    provider.execute(&query).await.expect("second waits for a token");
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(base.calls(), 2);
}

// ─── Circuit breaker ─────────────────────────────────────────────────────────

#[tokio::test]
async fn breaker_opens_then_recovers_after_cooldown() {
    let base = Recovering::new("wobbly", 2);
    let breaker = CircuitBreaker::new(
        base.clone(),
        CircuitBreakerConfig {
            failure_threshold: 2,
            cooldown_ms: 30,
        },
    );
    let query = QueryRequest::new("q");

    assert!(breaker.execute(&query).await.is_err());
    assert!(breaker.execute(&query).await.is_err());
    assert_eq!(breaker.state(), CircuitState::Open);

    let rejected = breaker.execute(&query).await.unwrap_err();
    assert_eq!(rejected.kind, FailureKind::CircuitOpen);
    assert_eq!(base.calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_millis(50)).await;
    breaker.execute(&query).await.expect("half-open trial succeeds");
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.consecutive_failures(), 0);
}

// ─── Cost and events ─────────────────────────────────────────────────────────

#[tokio::test]
async fn full_stack_records_cost_and_events() {
    let base = MockProvider::new(
        ProviderDescriptor::new("metered", "1.0")
            .with_capability("search")
            .with_cost_model(CostModel::new(0.01, 0.5)),
        Script::Records {
            records: vec![record("Acme", None, "metered", 0.7)],
            delay: Duration::ZERO,
            units: 4_000,
        },
    );
    let ledger = Arc::new(MemoryLedger::new());
    let sink = Arc::new(MemorySink::new());
    let stack = ProviderStack::new(base)
        .retrying(fast_retry(2))
        .circuit_breaker(CircuitBreakerConfig::default())
        .cost_tracked(ledger.clone())
        .instrumented(sink.clone());
    assert_eq!(
        stack.layers(),
        &["retry", "circuit_breaker", "cost", "instrument"]
    );
    let provider = stack.build();
    assert_eq!(provider.name(), "metered");

    let run = run_single(provider).await;
    assert!(run.all_succeeded());
    assert!((run.total_cost() - 2.01).abs() < 1e-9);

    let entries = ledger.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind, LedgerEntryKind::Estimate);
    assert_eq!(entries[1].kind, LedgerEntryKind::Reconcile);
    assert!((ledger.total_actual() - 2.01).abs() < 1e-9);
    assert_eq!(entries[1].request_id, run.request_id);

    let events = sink.events_for("metered");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].units, 4_000);
}
