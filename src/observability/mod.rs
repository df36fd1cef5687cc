//! Observability for switchyard.
//!
//! Two channels are provided:
//!
//! - `tracing` spans and events, named with the constants in [`spans`].
//!   The crate never installs a subscriber.
//! - Structured [`ProviderEvent`]s pushed to an [`EventSink`]. Sinks are
//!   best effort: an emit failure is logged and swallowed.
//!
//! # Example
//!
//! ```
//! use switchyard::observability::{EventSink, MemorySink};
//!
//! let sink = MemorySink::new();
//! assert!(sink.events().is_empty());
//! ```

pub mod sink;
pub mod spans;

pub use sink::{EventSink, MemorySink, NoopSink, ProviderEvent, TracingSink, emit_best_effort};
pub use spans::{
    FIELD_ATTEMPTS, FIELD_CAPABILITY, FIELD_LATENCY_MS, FIELD_OUTCOME, FIELD_PROVIDER,
    FIELD_PROVIDER_COUNT, FIELD_REQUEST_ID, SPAN_ORCHESTRATE, SPAN_PROVIDER_CALL,
};
