//! Tool-call span wrapping, nested inside an already-open trace.

use crate::harvest;
use invokelens_core::span::{Span, SpanStatus, SpanType, TraceContext};
use serde::Serialize;
use std::fmt;
use std::future::Future;

/// Wraps a sub-operation (typically a tool/function call an agent makes
/// mid-invocation) in a span on an existing [`TraceContext`]. Built via
/// [`crate::client::InvokeLensClient::trace_tool`].
pub struct ToolBuilder<'t> {
    trace: &'t TraceContext,
    name: String,
    span_type: SpanType,
    input: Option<String>,
}

impl<'t> ToolBuilder<'t> {
    /// Start building a span named `name` of type [`SpanType::Tool`].
    #[must_use]
    pub fn new(trace: &'t TraceContext, name: impl Into<String>) -> Self {
        Self { trace, name: name.into(), span_type: SpanType::Tool, input: None }
    }

    /// Override the span type (e.g. [`SpanType::Retrieval`]).
    #[must_use]
    pub fn span_type(mut self, span_type: SpanType) -> Self {
        self.span_type = span_type;
        self
    }

    /// Record the tool call's input payload on the span.
    #[must_use]
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Run `f` inside the span, without exposing the trace to the closure.
    pub async fn call<F, Fut, T, E>(self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize,
        E: fmt::Display,
    {
        self.call_with_trace(move |_trace| f()).await
    }

    /// Run `f` inside the span, passing the enclosing trace through so the
    /// tool can itself open nested spans.
    pub async fn call_with_trace<F, Fut, T, E>(self, f: F) -> Result<T, E>
    where
        F: FnOnce(&'t TraceContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize,
        E: fmt::Display,
    {
        let span: Span = self.trace.start_span(self.name, self.span_type, self.input, None);
        let result = f(self.trace).await;

        let output = match &result {
            Ok(value) => serde_json::to_value(value).ok().map(|v| harvest::response_summary(&v)),
            Err(_) => None,
        };
        let status = if result.is_ok() { SpanStatus::Ok } else { SpanStatus::Error };
        let error = result.as_ref().err().map(std::string::ToString::to_string);

        self.trace.end_span(span, output, status, error, 0, 0, None);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_call_records_ok_span_with_output() {
        let trace = TraceContext::new();
        let result: Result<String, String> = ToolBuilder::new(&trace, "search")
            .input("query")
            .call(|| async { Ok("result".to_string()) })
            .await;
        assert_eq!(result, Ok("result".to_string()));
        let spans = trace.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, SpanStatus::Ok);
        assert_eq!(spans[0].output.as_deref(), Some("result"));
    }

    #[tokio::test]
    async fn failing_call_records_error_span_and_propagates() {
        let trace = TraceContext::new();
        let result: Result<(), String> = ToolBuilder::new(&trace, "search").call(|| async { Err("boom".to_string()) }).await;
        assert_eq!(result, Err("boom".to_string()));
        let spans = trace.spans();
        assert_eq!(spans[0].status, SpanStatus::Error);
        assert_eq!(spans[0].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn call_with_trace_exposes_trace_for_nested_spans() {
        let trace = TraceContext::new();
        let result: Result<(), String> = ToolBuilder::new(&trace, "outer")
            .call_with_trace(|t| async move {
                t.start_span("inner", SpanType::Tool, None, None);
                Ok(())
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(trace.spans().len(), 2);
    }
}
