//! Span model and per-invocation trace collector.

use crate::cost::estimate_cost;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// Maximum number of spans retained per trace. Further `start_span` calls
/// return a detached span that is never recorded.
pub const MAX_SPANS_PER_TRACE: usize = 100;

/// Maximum length, in characters, of a span's `input`/`output` field.
pub const MAX_IO_LENGTH: usize = 2000;

const TRUNCATION_SUFFIX: &str = "...[truncated]";

/// The kind of operation a span represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanType {
    /// A single LLM call.
    Llm,
    /// A tool/function invocation.
    Tool,
    /// The root span wrapping an entire invocation.
    Chain,
    /// A retrieval step (e.g. vector search).
    Retrieval,
    /// A guardrail check surfaced as a span.
    Guardrail,
    /// Anything else.
    Custom,
}

/// Terminal status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanStatus {
    /// The span completed without error.
    Ok,
    /// The span ended in error.
    Error,
}

/// One timed, typed node in an invocation's trace tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Unique identifier for this span.
    pub span_id: String,
    /// Identifier of the enclosing span, or `None` at the root.
    pub parent_span_id: Option<String>,
    /// The kind of operation this span represents.
    pub span_type: SpanType,
    /// Human-readable name, typically the function or tool name.
    pub name: String,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end time, set by [`TraceContext::end_span`].
    pub ended_at: Option<DateTime<Utc>>,
    /// Duration in milliseconds, derived from `started_at`/`ended_at`.
    pub duration_ms: i64,
    /// Truncated input payload.
    pub input: Option<String>,
    /// Truncated output payload.
    pub output: Option<String>,
    /// Terminal status.
    pub status: SpanStatus,
    /// Error description, set only when `status == Error`.
    pub error: Option<String>,
    /// Model id associated with this span, if any.
    pub model_id: Option<String>,
    /// Input tokens consumed, if known.
    pub input_tokens: u64,
    /// Output tokens produced, if known.
    pub output_tokens: u64,
    /// Best-effort cost estimate, computed only when a model and at least
    /// one nonzero token count are present.
    pub estimated_cost_usd: f64,
}

impl Span {
    fn new(
        span_id: String,
        parent_span_id: Option<String>,
        span_type: SpanType,
        name: String,
        input: Option<String>,
        model_id: Option<String>,
    ) -> Self {
        Self {
            span_id,
            parent_span_id,
            span_type,
            name,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0,
            input: truncate(input),
            output: None,
            status: SpanStatus::Ok,
            error: None,
            model_id,
            input_tokens: 0,
            output_tokens: 0,
            estimated_cost_usd: 0.0,
        }
    }
}

/// Truncate a string to [`MAX_IO_LENGTH`], appending [`TRUNCATION_SUFFIX`]
/// when truncation occurs. The result never exceeds `MAX_IO_LENGTH`
/// characters, and equals exactly `MAX_IO_LENGTH` when truncated.
#[must_use]
pub fn truncate(value: Option<String>) -> Option<String> {
    value.map(|v| {
        if v.chars().count() <= MAX_IO_LENGTH {
            return v;
        }
        let keep = MAX_IO_LENGTH - TRUNCATION_SUFFIX.len();
        let head: String = v.chars().take(keep).collect();
        format!("{head}{TRUNCATION_SUFFIX}")
    })
}

struct TraceState {
    spans: Vec<Span>,
    active_stack: Vec<String>,
}

/// Collects spans for a single invocation.
///
/// Thread-safe: the active stack and span list are protected by a mutex,
/// since most invocations are single-threaded but nothing prevents a user
/// function from spawning concurrent tool calls.
pub struct TraceContext {
    state: Mutex<TraceState>,
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceContext {
    /// Create an empty trace context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TraceState {
                spans: Vec::new(),
                active_stack: Vec::new(),
            }),
        }
    }

    /// Start a new span, parented to the current top of the active stack.
    ///
    /// Returns a detached span once [`MAX_SPANS_PER_TRACE`] spans have
    /// already been recorded. Detached spans are fully formed but never
    /// stored, and ending one is a no-op.
    pub fn start_span(
        &self,
        name: impl Into<String>,
        span_type: SpanType,
        input: Option<String>,
        model_id: Option<String>,
    ) -> Span {
        let name = name.into();
        let Ok(mut state) = self.state.lock() else {
            return Span::new(Uuid::new_v4().to_string(), None, span_type, name, input, model_id);
        };

        if state.spans.len() >= MAX_SPANS_PER_TRACE {
            return Span::new(Uuid::new_v4().to_string(), None, span_type, name, input, model_id);
        }

        let parent_span_id = state.active_stack.last().cloned();
        let span = Span::new(Uuid::new_v4().to_string(), parent_span_id, span_type, name, input, model_id);
        state.active_stack.push(span.span_id.clone());
        state.spans.push(span.clone());
        span
    }

    /// Finalize a span: sets `ended_at`/`duration_ms`, truncates `output`,
    /// assigns status/error/tokens/model, and computes cost when a model id
    /// and at least one nonzero token count are present.
    ///
    /// Pops the active stack only if the ended span is currently its top,
    /// so out-of-order `end_span` calls cannot corrupt the stack.
    #[allow(clippy::too_many_arguments)]
    pub fn end_span(
        &self,
        mut span: Span,
        output: Option<String>,
        status: SpanStatus,
        error: Option<String>,
        input_tokens: u64,
        output_tokens: u64,
        model_id: Option<String>,
    ) -> Span {
        let ended_at = Utc::now();
        span.ended_at = Some(ended_at);
        span.output = truncate(output);
        span.status = status;
        span.error = error;
        span.input_tokens = input_tokens;
        span.output_tokens = output_tokens;
        if let Some(model_id) = model_id {
            span.model_id = Some(model_id);
        }

        span.duration_ms = (ended_at - span.started_at).num_milliseconds().max(0);

        if let Some(model_id) = &span.model_id {
            if input_tokens != 0 || output_tokens != 0 {
                span.estimated_cost_usd = estimate_cost(model_id, input_tokens, output_tokens);
            }
        }

        let Ok(mut state) = self.state.lock() else {
            return span;
        };
        if let Some(stored) = state.spans.iter_mut().find(|s| s.span_id == span.span_id) {
            *stored = span.clone();
        }
        if state.active_stack.last() == Some(&span.span_id) {
            state.active_stack.pop();
        }
        span
    }

    /// Run `f` inside a scoped span: the span ends with `status = Ok` on
    /// normal return, or `status = Error` (with `error` set from the
    /// closure's `Err`) when `f` fails. Mirrors a try/finally over the
    /// span lifecycle.
    pub fn scoped_span<T, E: std::fmt::Display>(
        &self,
        name: impl Into<String>,
        span_type: SpanType,
        input: Option<String>,
        model_id: Option<String>,
        f: impl FnOnce(&Span) -> Result<T, E>,
    ) -> Result<T, E> {
        let span = self.start_span(name, span_type, input, model_id.clone());
        match f(&span) {
            Ok(value) => {
                self.end_span(span, None, SpanStatus::Ok, None, 0, 0, model_id);
                Ok(value)
            }
            Err(err) => {
                let message = err.to_string();
                self.end_span(span, None, SpanStatus::Error, Some(message), 0, 0, model_id);
                Err(err)
            }
        }
    }

    /// All stored spans, in start order. Detached overflow spans are never
    /// included since they were never appended.
    #[must_use]
    pub fn spans(&self) -> Vec<Span> {
        self.state.lock().map(|state| state.spans.clone()).unwrap_or_default()
    }

    /// Names of all stored spans whose type is [`SpanType::Tool`], in the
    /// order they were started.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        state.spans.iter().filter(|s| s.span_type == SpanType::Tool).map(|s| s.name.clone()).collect()
    }
}
