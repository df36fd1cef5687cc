//! Structured provider events and the sinks that receive them.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CollaboratorError, FailureKind};
use crate::types::{Outcome, OutcomeKind};

/// One provider invocation, as seen by an event sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderEvent {
    /// Provider name.
    pub provider: String,
    /// Correlation ID of the query.
    pub request_id: Uuid,
    /// Coarse outcome.
    pub outcome: OutcomeKind,
    /// Failure classification when `outcome` is a failure.
    pub failure: Option<FailureKind>,
    /// When the call was dispatched.
    pub started_at: DateTime<Utc>,
    /// When the call finished (or was abandoned).
    pub finished_at: DateTime<Utc>,
    /// Measured latency.
    pub latency: Duration,
    /// Usage units reported.
    pub units: u64,
    /// Cost of the reported usage.
    pub cost: f64,
}

impl ProviderEvent {
    /// Build an event from an executor outcome.
    pub fn from_outcome(outcome: &Outcome, request_id: Uuid, started_at: DateTime<Utc>) -> Self {
        let latency = chrono::Duration::from_std(outcome.latency).unwrap_or(chrono::Duration::zero());
        Self {
            provider: outcome.provider.clone(),
            request_id,
            outcome: outcome.kind(),
            failure: outcome.failure_kind(),
            started_at,
            finished_at: started_at + latency,
            latency: outcome.latency,
            units: outcome.units(),
            cost: outcome.cost(),
        }
    }
}

/// Receiver of provider events.
///
/// Emission is best effort. Callers log and drop any error.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn emit(&self, event: &ProviderEvent) -> Result<(), CollaboratorError>;
}

/// Emit to `sink`, logging any error instead of returning it.
pub fn emit_best_effort(sink: &dyn EventSink, event: &ProviderEvent) {
    if let Err(e) = sink.emit(event) {
        tracing::warn!(provider = %event.provider, error = %e, "event sink rejected provider event");
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &ProviderEvent) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Sink that turns events into `tracing` events at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &ProviderEvent) -> Result<(), CollaboratorError> {
        tracing::debug!(
            provider = %event.provider,
            request_id = %event.request_id,
            outcome = %event.outcome,
            failure = ?event.failure,
            latency_ms = event.latency.as_millis() as u64,
            units = event.units,
            cost = event.cost,
            "provider event"
        );
        Ok(())
    }
}

/// Sink that keeps every event in memory. Useful in tests and for
/// short-lived batch jobs that report at the end.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ProviderEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events received so far.
    pub fn events(&self) -> Vec<ProviderEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events for one provider.
    pub fn events_for(&self, provider: &str) -> Vec<ProviderEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.provider == provider)
            .collect()
    }

    /// Drop all stored events.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &ProviderEvent) -> Result<(), CollaboratorError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}
