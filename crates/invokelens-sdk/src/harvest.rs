//! Best-effort extraction of tokens, model id, and provider-specific trace
//! structure from a user function's return value.
//!
//! Operates on `serde_json::Value` so the wrapper stays generic over
//! whatever response type the embedding application's LLM client returns:
//! the caller only needs `T: Serialize`, never a provider-specific type.

use invokelens_core::span::{SpanType, TraceContext};
use serde_json::Value;

const RESPONSE_SUMMARY_LENGTH: usize = 500;

fn dig<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

fn as_u64(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| value.as_f64().map(|f| f as u64))
}

/// Probe, in order, `usage.inputTokens` / `usage.input_tokens`, then
/// `ResponseMetadata.usage.inputTokens` (analogously for output tokens).
/// Defaults to `0` when nothing matches.
#[must_use]
pub fn extract_tokens(value: &Value) -> (u64, u64) {
    let input = dig(value, &["usage", "inputTokens"])
        .or_else(|| dig(value, &["usage", "input_tokens"]))
        .or_else(|| dig(value, &["ResponseMetadata", "usage", "inputTokens"]))
        .and_then(as_u64)
        .unwrap_or(0);

    let output = dig(value, &["usage", "outputTokens"])
        .or_else(|| dig(value, &["usage", "output_tokens"]))
        .or_else(|| dig(value, &["ResponseMetadata", "usage", "outputTokens"]))
        .and_then(as_u64)
        .unwrap_or(0);

    (input, output)
}

/// Probe `modelId` then `model_id`, falling back to the wrapper's
/// configured model id. `configured` is never empty: `ObserveBuilder`
/// defaults it to `"unknown"`, mirroring the original's
/// `self.model_id = model_id or "unknown"`, so a model id is always
/// available for cost estimation and the emitted event.
#[must_use]
pub fn extract_model_id(value: &Value, configured: &str) -> String {
    value
        .get("modelId")
        .or_else(|| value.get("model_id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| configured.to_string())
}

/// Stringify and truncate `value` to [`RESPONSE_SUMMARY_LENGTH`] chars for
/// the telemetry event's `response_summary` field.
#[must_use]
pub fn response_summary(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= RESPONSE_SUMMARY_LENGTH {
        text
    } else {
        text.chars().take(RESPONSE_SUMMARY_LENGTH).collect()
    }
}

/// Best-effort harvest of Bedrock-agent-style orchestration trace data into
/// child spans. Entirely swallowed on any shape mismatch: this is scanning
/// an optional, provider-specific structure that most responses won't have.
pub fn harvest_provider_trace(trace: &TraceContext, value: &Value) {
    if let Some(invocations) = dig(value, &["trace", "orchestrationTrace", "modelInvocationInput"]).and_then(Value::as_array) {
        for entry in invocations {
            let input = entry.get("text").and_then(Value::as_str).map(str::to_string);
            let output = dig(entry, &["rawResponse", "content"]).and_then(Value::as_str).map(str::to_string);
            let model = entry.get("foundationModel").and_then(Value::as_str).map(str::to_string);
            let span = trace.start_span("model_invocation", SpanType::Llm, input, model);
            trace.end_span(span, output, invokelens_core::span::SpanStatus::Ok, None, 0, 0, None);
        }
    }

    if let Some(invocations) = dig(value, &["trace", "orchestrationTrace", "invocationInput"]).and_then(Value::as_array) {
        for entry in invocations {
            let Some(action_group) = entry.get("actionGroupInvocationInput") else { continue };
            let name = action_group.get("actionGroupName").and_then(Value::as_str).unwrap_or("tool").to_string();
            let input = action_group.get("apiPath").and_then(Value::as_str).map(str::to_string);
            let output = action_group.get("verb").and_then(Value::as_str).map(str::to_string);
            let span = trace.start_span(name, SpanType::Tool, input, None);
            trace.end_span(span, output, invokelens_core::span::SpanStatus::Ok, None, 0, 0, None);
        }
    }
}
