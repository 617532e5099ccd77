//! Data model and pure-computation primitives shared by the InvokeLens SDK
//! crates: the telemetry event schema, span/trace tree, prompt fingerprint,
//! cost estimator, and guardrail policy/error types. Contains no networking.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod cost;
pub mod error;
pub mod event;
pub mod fingerprint;
pub mod policy;
pub mod span;

pub mod prelude {
    //! Common imports for crates building on `invokelens-core`.
    pub use crate::cost::estimate_cost;
    pub use crate::error::GuardrailError;
    pub use crate::event::{EventType, InvocationStatus, TelemetryEvent, TelemetryEventInput, UNKNOWN_MODEL_ID};
    pub use crate::fingerprint::{compute_fingerprint, compute_similarity, PromptFingerprint};
    pub use crate::policy::{Enforcement, PolicyRecord, PolicyType};
    pub use crate::span::{Span, SpanStatus, SpanType, TraceContext, MAX_IO_LENGTH, MAX_SPANS_PER_TRACE};
}
