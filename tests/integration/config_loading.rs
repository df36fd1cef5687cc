//! Loading configuration from disk and its effect on orchestration.

use std::io::Write;
use std::sync::Arc;

use switchyard::{
    OrchestratorConfig, OrchestratorError, Orchestrator, QueryRequest, Registry, Selection,
};

use crate::helpers::{MockProvider, record};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(contents.as_bytes()).expect("write");
    file
}

#[test]
fn load_reads_toml_from_disk() {
    let file = write_config(
        r#"
        default_timeout_ms = 2500
        max_results = 3
        cache_ttl_seconds = 30
        fallback_capability = "web_search"

        [retry]
        max_attempts = 4
        base_delay_ms = 250

        [circuit_breaker]
        failure_threshold = 7
        "#,
    );
    let config = OrchestratorConfig::load(file.path()).expect("load");
    assert_eq!(config.default_timeout_ms, 2_500);
    assert_eq!(config.max_results, 3);
    assert_eq!(config.cache_ttl_seconds, 30);
    assert_eq!(config.fallback_capability.as_deref(), Some("web_search"));
    assert_eq!(config.retry.max_attempts, 4);
    assert_eq!(config.retry.base_delay_ms, 250);
    assert_eq!(config.circuit_breaker.failure_threshold, 7);
    assert_eq!(config.circuit_breaker.cooldown_ms, 60_000);
}

#[test]
fn empty_file_yields_defaults() {
    let file = write_config("");
    let config = OrchestratorConfig::load(file.path()).expect("load");
    assert_eq!(config, OrchestratorConfig::default());
}

#[test]
fn missing_file_is_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = OrchestratorConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, OrchestratorError::Config(_)));
    assert_eq!(err.code(), "CONFIG_INVALID");
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn invalid_values_are_rejected_on_load() {
    let file = write_config("default_timeout_ms = 0\n");
    let err = OrchestratorConfig::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("default_timeout_ms"));
}

#[test]
fn saved_config_loads_back() {
    let config = OrchestratorConfig {
        max_results: 12,
        fallback_capability: Some("company_search".into()),
        ..Default::default()
    };
    let file = write_config(&config.to_toml_string().expect("serialize"));
    assert_eq!(OrchestratorConfig::load(file.path()).expect("load"), config);
}

#[tokio::test]
async fn max_results_caps_query_limit() {
    let file = write_config("max_results = 2\n");
    let config = OrchestratorConfig::load(file.path()).expect("load");

    let registry = Arc::new(Registry::new());
    registry
        .register(MockProvider::returning(
            "wide",
            "search",
            vec![
                record("One", None, "wide", 0.9),
                record("Two", None, "wide", 0.8),
                record("Three", None, "wide", 0.7),
            ],
        ))
        .await
        .expect("register");
    let orchestrator = Orchestrator::new(registry, config).expect("config");
    let run = orchestrator
        .execute(
            &QueryRequest::new("q").with_limit(10),
            &Selection::capability("search"),
        )
        .await
        .expect("execute");
    let names: Vec<&str> = run.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["One", "Two"]);
}

#[tokio::test]
async fn fallback_capability_used_when_selection_is_empty() {
    let file = write_config("fallback_capability = \"web_search\"\n");
    let config = OrchestratorConfig::load(file.path()).expect("load");

    let registry = Arc::new(Registry::new());
    registry
        .register(MockProvider::returning(
            "exa",
            "web_search",
            vec![record("Acme", None, "exa", 0.5)],
        ))
        .await
        .expect("register");
    let orchestrator = Orchestrator::new(registry, config).expect("config");
    let run = orchestrator
        .execute(&QueryRequest::new("q"), &Selection::capability("news_search"))
        .await
        .expect("falls back to web_search");
    assert_eq!(run.outcomes[0].provider, "exa");
}

#[tokio::test]
async fn cache_ttl_serves_repeat_queries_from_cache() {
    let file = write_config("cache_ttl_seconds = 60\n");
    let config = OrchestratorConfig::load(file.path()).expect("load");

    let registry = Arc::new(Registry::new());
    let provider = MockProvider::returning("exa", "search", vec![record("Acme", None, "exa", 0.5)]);
    registry.register(provider.clone()).await.expect("register");
    let orchestrator = Orchestrator::new(registry, config).expect("config");
    let selection = Selection::capability("search");

    let first = orchestrator
        .execute(&QueryRequest::new("Fintech"), &selection)
        .await
        .expect("first");
    let repeat = QueryRequest::new("fintech ");
    let second = orchestrator.execute(&repeat, &selection).await.expect("second");

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.request_id, repeat.request_id);
    assert_eq!(second.results, first.results);
    assert_eq!(provider.calls(), 1);

    orchestrator.clear_cache();
    orchestrator
        .execute(&QueryRequest::new("fintech"), &selection)
        .await
        .expect("third");
    assert_eq!(provider.calls(), 2);
}
