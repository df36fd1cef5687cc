//! Concurrent fan-out with per-provider isolation.
//!
//! Every provider runs in its own spawned task and is awaited against a
//! shared deadline. A provider that errors, panics, or hangs produces a
//! failure outcome for itself only. Outcomes are returned in input order
//! regardless of completion order.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::Instrument;

use crate::error::{FailureKind, ProviderError};
use crate::health::HealthRecorder;
use crate::observability::{
    EventSink, FIELD_ATTEMPTS, FIELD_LATENCY_MS, FIELD_OUTCOME, NoopSink, ProviderEvent,
    emit_best_effort,
};
use crate::provider::SharedProvider;
use crate::types::{Outcome, OutcomeStatus, QueryRequest};

/// Runs one query against many providers at once.
///
/// The executor never retries; retries belong to the
/// [`Retrying`](crate::resilience::Retrying) decorator.
#[derive(Clone)]
pub struct FanoutExecutor {
    health: Option<Arc<dyn HealthRecorder>>,
    sink: Arc<dyn EventSink>,
}

impl Default for FanoutExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FanoutExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutExecutor")
            .field("records_health", &self.health.is_some())
            .finish_non_exhaustive()
    }
}

impl FanoutExecutor {
    /// An executor with no health recorder and a no-op event sink.
    pub fn new() -> Self {
        Self {
            health: None,
            sink: Arc::new(NoopSink),
        }
    }

    /// Report every outcome to `recorder`.
    #[must_use]
    pub fn with_health_recorder(mut self, recorder: Arc<dyn HealthRecorder>) -> Self {
        self.health = Some(recorder);
        self
    }

    /// Emit one event per outcome to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run `query` against `providers` until `deadline`.
    ///
    /// Returns exactly one outcome per provider, in input order. Providers
    /// still pending at the deadline get a retryable `Timeout` failure; their
    /// tasks keep running detached and whatever they produce is discarded.
    /// Providers dispatched after the deadline has passed are skipped.
    pub async fn run(
        &self,
        query: &QueryRequest,
        providers: &[SharedProvider],
        deadline: Instant,
    ) -> Vec<Outcome> {
        if providers.is_empty() {
            return Vec::new();
        }

        let query = Arc::new(query.clone());
        let calls = providers
            .iter()
            .map(|provider| self.call(Arc::clone(provider), Arc::clone(&query), deadline));
        join_all(calls).await
    }

    async fn call(
        &self,
        provider: SharedProvider,
        query: Arc<QueryRequest>,
        deadline: Instant,
    ) -> Outcome {
        let name = provider.name().to_owned();
        let started_at = Utc::now();
        let start = Instant::now();

        let span = crate::provider_call_span!(name, query.request_id);
        let status = if start >= deadline {
            OutcomeStatus::Skipped {
                reason: "deadline passed before dispatch".into(),
            }
        } else {
            let task_provider = Arc::clone(&provider);
            let task_query = Arc::clone(&query);
            let handle = tokio::spawn(
                async move { task_provider.execute(&task_query).await }
                    .instrument(span.clone()),
            );

            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(Ok(response))) => {
                    let cost = provider.response_cost(&response);
                    OutcomeStatus::Success { response, cost }
                }
                Ok(Ok(Err(e))) if e.kind == FailureKind::CircuitOpen => {
                    OutcomeStatus::Skipped { reason: e.message }
                }
                Ok(Ok(Err(e))) => OutcomeStatus::Failure(e),
                Ok(Err(join_err)) => OutcomeStatus::Failure(ProviderError::panicked(format!(
                    "provider task aborted: {join_err}"
                ))),
                Err(_elapsed) => OutcomeStatus::Failure(ProviderError::timeout(format!(
                    "provider '{name}' did not finish before the deadline"
                ))),
            }
        };

        let outcome = Outcome {
            provider: name,
            latency: start.elapsed(),
            status,
        };
        span.record(FIELD_OUTCOME, tracing::field::display(outcome.kind()));
        span.record(FIELD_LATENCY_MS, outcome.latency.as_millis() as u64);
        if let OutcomeStatus::Success { response, .. } = &outcome.status {
            span.record(FIELD_ATTEMPTS, response.attempts);
        }
        self.report(&outcome, &query, started_at);
        outcome
    }

    fn report(&self, outcome: &Outcome, query: &QueryRequest, started_at: chrono::DateTime<Utc>) {
        let latency_ms = outcome.latency.as_millis() as u64;
        match &outcome.status {
            OutcomeStatus::Success { response, .. } => tracing::debug!(
                provider = %outcome.provider,
                latency_ms,
                records = response.records.len(),
                attempts = response.attempts,
                "provider succeeded"
            ),
            OutcomeStatus::Failure(e) => tracing::warn!(
                provider = %outcome.provider,
                latency_ms,
                error = %e,
                "provider failed"
            ),
            OutcomeStatus::Skipped { reason } => tracing::debug!(
                provider = %outcome.provider,
                reason = %reason,
                "provider skipped"
            ),
        }

        if let Some(health) = &self.health {
            health.record_outcome(&outcome.provider, outcome.kind(), outcome.latency);
        }
        let event = ProviderEvent::from_outcome(outcome, query.request_id, started_at);
        emit_best_effort(self.sink.as_ref(), &event);
    }
}
