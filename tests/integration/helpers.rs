//! Shared helpers for integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use switchyard::{
    Provider, ProviderDescriptor, ProviderError, ProviderResponse, QueryRequest, ResultRecord,
    Usage,
};
use tracing_subscriber::EnvFilter;

/// Route `tracing` output to the test harness. Set `RUST_LOG` to see it.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// What a [`MockProvider`] does when called.
#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Return these records after `delay`.
    Records {
        records: Vec<ResultRecord>,
        delay: Duration,
        units: u64,
    },
    /// Fail with this error.
    Fail(ProviderError),
    /// Never finish in any reasonable time.
    Hang,
}

/// Scripted in-memory provider.
pub(crate) struct MockProvider {
    descriptor: ProviderDescriptor,
    script: Script,
    calls: AtomicU32,
}

impl MockProvider {
    pub(crate) fn new(descriptor: ProviderDescriptor, script: Script) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            script,
            calls: AtomicU32::new(0),
        })
    }

    /// Provider with one capability returning `records` immediately.
    pub(crate) fn returning(name: &str, capability: &str, records: Vec<ResultRecord>) -> Arc<Self> {
        Self::new(
            ProviderDescriptor::new(name, "1.0").with_capability(capability),
            Script::Records {
                records,
                delay: Duration::ZERO,
                units: 0,
            },
        )
    }

    /// Provider with one capability that always fails.
    pub(crate) fn failing(name: &str, capability: &str, retryable: bool) -> Arc<Self> {
        Self::new(
            ProviderDescriptor::new(name, "1.0").with_capability(capability),
            Script::Fail(ProviderError::provider(format!("{name} unavailable"), retryable)),
        )
    }

    /// Provider with one capability that hangs.
    pub(crate) fn hanging(name: &str, capability: &str) -> Arc<Self> {
        Self::new(
            ProviderDescriptor::new(name, "1.0").with_capability(capability),
            Script::Hang,
        )
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _query: &QueryRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Records {
                records,
                delay,
                units,
            } => {
                tokio::time::sleep(*delay).await;
                Ok(ProviderResponse::new(records.clone()).with_usage(Usage::new(*units)))
            }
            Script::Fail(e) => Err(e.clone()),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok(ProviderResponse::new(vec![]))
            }
        }
    }
}

/// A record with an optional website.
pub(crate) fn record(name: &str, website: Option<&str>, provider: &str, confidence: f64) -> ResultRecord {
    let r = ResultRecord::new(name, provider, confidence);
    match website {
        Some(site) => r.with_website(site),
        None => r,
    }
}
