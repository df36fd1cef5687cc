//! End-to-end orchestration scenarios against scripted providers.

use std::sync::Arc;
use std::time::Duration;

use switchyard::observability::MemorySink;
use switchyard::orchestrator::{FanoutExecutor, aggregate};
use switchyard::resilience::Fallback;
use switchyard::{
    FailureKind, OrchestratorConfig, OrchestratorError, Orchestrator, OutcomeKind,
    OutcomeStatus, ProviderDescriptor, ProviderError, QueryRequest, Registry, Selection,
    SharedProvider,
};

use crate::helpers::{MockProvider, Script, init_tracing, record};

async fn orchestrator_with(providers: Vec<SharedProvider>) -> Orchestrator {
    init_tracing();
    let registry = Arc::new(Registry::new());
    for provider in providers {
        registry.register(provider).await.expect("register");
    }
    Orchestrator::new(registry, OrchestratorConfig::default()).expect("config")
}

// ─── Aggregation scenarios ───────────────────────────────────────────────────

#[tokio::test]
async fn stripe_and_square_merge_across_providers() {
    let a = MockProvider::returning(
        "A",
        "company_search",
        vec![record("Stripe", Some("stripe.com"), "A", 0.7)],
    );
    let b = MockProvider::returning(
        "B",
        "company_search",
        vec![
            record("stripe inc", Some("https://stripe.com/about"), "B", 0.9),
            record("Square", Some("squareup.com"), "B", 0.8),
        ],
    );
    let orchestrator = orchestrator_with(vec![a, b]).await;

    let run = orchestrator
        .execute(
            &QueryRequest::new("payments companies"),
            &Selection::capability("company_search"),
        )
        .await
        .expect("execute");

    assert_eq!(run.results.len(), 2);
    let stripe = &run.results[0];
    assert_eq!(stripe.name, "Stripe");
    assert!((stripe.confidence - 0.9).abs() < f64::EPSILON);
    assert_eq!(stripe.found_by_providers, vec!["A", "B"]);

    let square = &run.results[1];
    assert_eq!(square.name, "Square");
    assert!((square.confidence - 0.8).abs() < f64::EPSILON);
    assert_eq!(square.found_by_providers, vec!["B"]);
}

#[tokio::test]
async fn aggregation_is_deterministic_across_runs() {
    let build = || async {
        orchestrator_with(vec![
            MockProvider::returning(
                "x",
                "search",
                vec![record("Alpha", None, "x", 0.5), record("Beta", None, "x", 0.5)],
            ),
            MockProvider::returning(
                "y",
                "search",
                vec![record("Gamma", None, "y", 0.5), record("alpha", None, "y", 0.5)],
            ),
        ])
        .await
    };
    let first = build()
        .await
        .execute(&QueryRequest::new("q"), &Selection::capability("search"))
        .await
        .expect("run");
    let second = build()
        .await
        .execute(&QueryRequest::new("q"), &Selection::capability("search"))
        .await
        .expect("run");

    let names = |run: &switchyard::Orchestration| {
        run.results.iter().map(|r| r.name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(names(&first), names(&second));
    assert_eq!(names(&first), vec!["Alpha", "Beta", "Gamma"]);
}

// ─── Selection errors ────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_registry_has_no_providers_available() {
    let orchestrator =
        Orchestrator::new(Arc::new(Registry::new()), OrchestratorConfig::default()).expect("config");
    let err = orchestrator
        .execute(&QueryRequest::new("anything"), &Selection::defaults())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NoProvidersAvailable(_)));
}

#[tokio::test]
async fn unknown_explicit_name_is_not_found() {
    let orchestrator = orchestrator_with(vec![MockProvider::returning("a", "search", vec![])]).await;
    let err = orchestrator
        .execute(&QueryRequest::new("q"), &Selection::names(["a", "zzz"]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

// ─── Failure isolation ───────────────────────────────────────────────────────

#[tokio::test]
async fn all_failed_run_is_not_an_error() {
    let orchestrator = orchestrator_with(vec![
        MockProvider::failing("a", "search", false),
        MockProvider::failing("b", "search", true),
    ])
    .await;
    let run = orchestrator
        .execute(&QueryRequest::new("q"), &Selection::capability("search"))
        .await
        .expect("per-provider failures are not errors");
    assert!(run.results.is_empty());
    assert_eq!(run.count(OutcomeKind::Failure), 2);
}

#[tokio::test]
async fn hanging_provider_times_out_without_blocking_others() {
    let orchestrator = orchestrator_with(vec![
        MockProvider::returning("fast", "search", vec![record("Acme", None, "fast", 0.6)]),
        MockProvider::hanging("stuck", "search"),
    ])
    .await;

    let started = std::time::Instant::now();
    let run = orchestrator
        .execute(
            &QueryRequest::new("q").with_timeout(Duration::from_millis(150)),
            &Selection::capability("search"),
        )
        .await
        .expect("execute");
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(run.outcomes.len(), 2);
    assert!(run.outcome("fast").expect("fast").is_success());
    let stuck = run.outcome("stuck").expect("stuck");
    assert_eq!(stuck.failure_kind(), Some(FailureKind::Timeout));
    assert_eq!(run.count(OutcomeKind::Failure), 1);
    assert_eq!(run.results.len(), 1);
}

#[tokio::test]
async fn outcomes_match_selection_order_for_any_completion_order() {
    let slow = MockProvider::new(
        ProviderDescriptor::new("slow", "1.0").with_capability("search"),
        Script::Records {
            records: vec![],
            delay: Duration::from_millis(80),
            units: 0,
        },
    );
    let medium = MockProvider::new(
        ProviderDescriptor::new("medium", "1.0").with_capability("search"),
        Script::Records {
            records: vec![],
            delay: Duration::from_millis(30),
            units: 0,
        },
    );
    let fast = MockProvider::returning("fast", "search", vec![]);
    let providers: Vec<SharedProvider> = vec![slow, fast, medium];

    let outcomes = FanoutExecutor::new()
        .run(
            &QueryRequest::new("q"),
            &providers,
            tokio::time::Instant::now() + Duration::from_secs(2),
        )
        .await;
    let names: Vec<&str> = outcomes.iter().map(|o| o.provider.as_str()).collect();
    assert_eq!(names, vec!["slow", "fast", "medium"]);
}

// ─── Fallback ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fallback_result_is_tagged_through_the_orchestrator() {
    let primary = MockProvider::failing("primary", "search", false);
    let backup = MockProvider::returning("backup", "search", vec![record("Acme", None, "backup", 0.5)]);
    let chain: SharedProvider = Arc::new(Fallback::new(primary, vec![backup]));
    let orchestrator = orchestrator_with(vec![chain]).await;

    let run = orchestrator
        .execute(&QueryRequest::new("q"), &Selection::names(["primary"]))
        .await
        .expect("execute");
    match &run.outcome("primary").expect("outcome").status {
        OutcomeStatus::Success { response, .. } => {
            assert!(response.used_fallback);
            assert_eq!(response.fallback_index, Some(0));
            assert_eq!(response.served_by.as_deref(), Some("backup"));
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(run.results[0].source_provider, "backup");
}

// ─── Observability and health ────────────────────────────────────────────────

#[tokio::test]
async fn events_and_health_follow_each_run() {
    let registry = Arc::new(Registry::new());
    registry
        .register(MockProvider::new(
            ProviderDescriptor::new("metered", "1.0")
                .with_capability("search")
                .with_cost_model(switchyard::CostModel::new(0.0, 1.0)),
            Script::Records {
                records: vec![record("Acme", None, "metered", 0.5)],
                delay: Duration::ZERO,
                units: 2_000,
            },
        ))
        .await
        .expect("register");
    registry
        .register(MockProvider::failing("broken", "search", true))
        .await
        .expect("register");

    let sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(registry.clone(), OrchestratorConfig::default())
        .expect("config")
        .with_event_sink(sink.clone());
    let query = QueryRequest::new("q");
    let run = orchestrator
        .execute(&query, &Selection::capability("search"))
        .await
        .expect("execute");

    assert!((run.total_cost() - 2.0).abs() < 1e-12);
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.request_id == query.request_id));
    let metered = &sink.events_for("metered")[0];
    assert_eq!(metered.units, 2_000);
    assert_eq!(sink.events_for("broken")[0].failure, Some(FailureKind::Provider));

    assert_eq!(registry.health("metered").expect("health").success_count, 1);
    let broken = registry.health("broken").expect("health");
    assert_eq!(broken.failure_count, 1);
    assert_eq!(broken.consecutive_failures, 1);
}

#[tokio::test]
async fn circuit_open_provider_is_skipped() {
    let registry = Arc::new(Registry::new());
    let config = OrchestratorConfig {
        circuit_breaker: switchyard::resilience::CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown_ms: 60_000,
        },
        retry: switchyard::resilience::RetryPolicy::new().with_max_attempts(1),
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(registry.clone(), config).expect("config");
    let flaky = MockProvider::new(
        ProviderDescriptor::new("flaky", "1.0").with_capability("search"),
        Script::Fail(ProviderError::provider("503", true)),
    );
    registry
        .register(orchestrator.decorate(flaky.clone()))
        .await
        .expect("register");

    let selection = Selection::capability("search");
    let first = orchestrator.execute(&QueryRequest::new("q"), &selection).await.expect("run");
    assert_eq!(first.count(OutcomeKind::Failure), 1);

    let second = orchestrator.execute(&QueryRequest::new("q"), &selection).await.expect("run");
    assert_eq!(second.count(OutcomeKind::Skipped), 1);
    assert_eq!(flaky.calls(), 1);
    assert_eq!(registry.health("flaky").expect("health").skipped_count, 1);
}

#[test]
fn aggregate_is_usable_without_an_orchestrator() {
    assert!(aggregate(&[], 10).is_empty());
}

#[tokio::test]
async fn fallback_answer_is_billed_at_the_fallback_price() {
    let free_primary = MockProvider::failing("primary", "search", false);
    let paid_backup = MockProvider::new(
        ProviderDescriptor::new("backup", "1.0")
            .with_capability("search")
            .with_cost_model(switchyard::CostModel::new(1.0, 10.0)),
        Script::Records {
            records: vec![record("Acme", None, "backup", 0.5)],
            delay: Duration::ZERO,
            units: 1_000,
        },
    );
    let ledger = Arc::new(switchyard::resilience::MemoryLedger::new());
    let sink = Arc::new(MemorySink::new());
    let chain = switchyard::resilience::ProviderStack::new(free_primary)
        .with_fallbacks(vec![paid_backup as SharedProvider])
        .cost_tracked(ledger.clone())
        .build();

    let registry = Arc::new(Registry::new());
    registry.register(chain).await.expect("register");
    let orchestrator = Orchestrator::new(registry, OrchestratorConfig::default())
        .expect("config")
        .with_event_sink(sink.clone());
    let run = orchestrator
        .execute(&QueryRequest::new("q"), &Selection::names(["primary"]))
        .await
        .expect("execute");

    assert!((run.total_cost() - 11.0).abs() < 1e-9);
    assert!((ledger.total_actual() - 11.0).abs() < 1e-9);
    assert!((sink.events_for("primary")[0].cost - 11.0).abs() < 1e-9);
}
