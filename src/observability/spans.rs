/// Span names and field keys used across switchyard.
///
/// Spans follow the hierarchy:
///
/// ```text
/// switchyard.orchestrate
///   └─> switchyard.provider.call (one per selected provider)
/// ```
///
/// # Example
///
/// ```rust,ignore
/// use switchyard::provider_call_span;
///
/// let span = provider_call_span!("exa", request_id);
/// let _enter = span.enter();
/// ```
// Span names (hierarchical, dot-separated)
/// Root span for one `Orchestrator::execute` call.
pub const SPAN_ORCHESTRATE: &str = "switchyard.orchestrate";

/// Span for one provider invocation inside a fan-out.
pub const SPAN_PROVIDER_CALL: &str = "switchyard.provider.call";

// Field keys for span attributes
/// Provider name field.
pub const FIELD_PROVIDER: &str = "provider";

/// Query correlation ID field (UUID v4).
pub const FIELD_REQUEST_ID: &str = "request_id";

/// Capability used for selection.
pub const FIELD_CAPABILITY: &str = "capability";

/// Number of providers selected for a fan-out.
pub const FIELD_PROVIDER_COUNT: &str = "provider_count";

/// Outcome kind field ("success", "failure", "skipped").
pub const FIELD_OUTCOME: &str = "outcome";

/// Latency in milliseconds.
pub const FIELD_LATENCY_MS: &str = "latency_ms";

/// Attempts made by a retrying provider.
pub const FIELD_ATTEMPTS: &str = "attempts";

/// Creates the root span for an orchestration call.
///
/// `capability` starts empty and is recorded by the facade when the
/// selection names one.
#[macro_export]
macro_rules! orchestrate_span {
    ($request_id:expr, $provider_count:expr) => {
        tracing::info_span!(
            $crate::observability::spans::SPAN_ORCHESTRATE,
            { $crate::observability::spans::FIELD_REQUEST_ID } = tracing::field::display($request_id),
            { $crate::observability::spans::FIELD_PROVIDER_COUNT } = $provider_count,
            { $crate::observability::spans::FIELD_CAPABILITY } = tracing::field::Empty,
        )
    };
}

/// Creates the span for a single provider call.
///
/// `outcome`, `latency_ms` and `attempts` start empty and are recorded by
/// the executor once the call settles.
#[macro_export]
macro_rules! provider_call_span {
    ($provider:expr, $request_id:expr) => {
        tracing::debug_span!(
            $crate::observability::spans::SPAN_PROVIDER_CALL,
            { $crate::observability::spans::FIELD_PROVIDER } = tracing::field::display(&$provider),
            { $crate::observability::spans::FIELD_REQUEST_ID } = tracing::field::display($request_id),
            { $crate::observability::spans::FIELD_OUTCOME } = tracing::field::Empty,
            { $crate::observability::spans::FIELD_LATENCY_MS } = tracing::field::Empty,
            { $crate::observability::spans::FIELD_ATTEMPTS } = tracing::field::Empty,
        )
    };
}
