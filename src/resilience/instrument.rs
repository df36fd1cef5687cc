//! Instrumentation decorator.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::Instrument;

use crate::error::{FailureKind, ProviderError};
use crate::observability::{
    EventSink, FIELD_ATTEMPTS, FIELD_LATENCY_MS, FIELD_OUTCOME, ProviderEvent, emit_best_effort,
};
use crate::provider::{Provider, SharedProvider};
use crate::types::{OutcomeKind, ProviderDescriptor, ProviderResponse, QueryRequest};

/// Emits a [`ProviderEvent`] for every call to the inner provider.
///
/// The result passes through untouched. A circuit-open rejection is
/// reported as `Skipped`, matching the executor.
pub struct Instrumented {
    inner: SharedProvider,
    sink: Arc<dyn EventSink>,
}

impl Instrumented {
    /// Wrap `inner`, emitting to `sink`.
    pub fn new(inner: SharedProvider, sink: Arc<dyn EventSink>) -> Self {
        Self { inner, sink }
    }
}

impl std::fmt::Debug for Instrumented {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumented")
            .field("inner", &self.inner.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Provider for Instrumented {
    fn descriptor(&self) -> &ProviderDescriptor {
        self.inner.descriptor()
    }

    async fn execute(&self, query: &QueryRequest) -> Result<ProviderResponse, ProviderError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let span = crate::provider_call_span!(self.inner.name(), query.request_id);
        let result = self.inner.execute(query).instrument(span.clone()).await;
        let latency = start.elapsed();

        let (outcome, failure, units, cost) = match &result {
            Ok(response) => (
                OutcomeKind::Success,
                None,
                response.usage.units,
                self.inner.response_cost(response),
            ),
            Err(e) if e.kind == FailureKind::CircuitOpen => {
                (OutcomeKind::Skipped, Some(e.kind), 0, 0.0)
            }
            Err(e) => (OutcomeKind::Failure, Some(e.kind), 0, 0.0),
        };
        span.record(FIELD_OUTCOME, tracing::field::display(outcome));
        span.record(FIELD_LATENCY_MS, latency.as_millis() as u64);
        if let Ok(response) = &result {
            span.record(FIELD_ATTEMPTS, response.attempts);
        }

        let finished_at =
            started_at + chrono::Duration::from_std(latency).unwrap_or(chrono::Duration::zero());
        let event = ProviderEvent {
            provider: self.inner.name().to_owned(),
            request_id: query.request_id,
            outcome,
            failure,
            started_at,
            finished_at,
            latency,
            units,
            cost,
        };
        emit_best_effort(self.sink.as_ref(), &event);
        result
    }

    async fn validate(&self) -> bool {
        self.inner.validate().await
    }

    fn estimate_cost(&self, units: u64) -> f64 {
        self.inner.estimate_cost(units)
    }
}
