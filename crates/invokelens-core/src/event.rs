//! The telemetry event emitted once per invocation.

use crate::fingerprint::PromptFingerprint;
use crate::span::Span;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// SDK release embedded in every event, for server-side compatibility checks.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema version of the telemetry event payload itself, independent of the
/// SDK's own release cadence.
pub const EVENT_VERSION: &str = "1.0";

/// Maximum length of `error_message` and `prompt_summary`/`response_summary`.
pub const MAX_SUMMARY_LENGTH: usize = 500;

/// Default `model_id` when the caller never configures one and the
/// harvested response carries no model field of its own. Matches the
/// original's `self.model_id = model_id or "unknown"`: a model id is
/// always present so cost estimation always has a pricing key to resolve.
pub const UNKNOWN_MODEL_ID: &str = "unknown";

/// Outcome of the wrapped invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILURE")]
    Failure,
    #[serde(rename = "TIMEOUT")]
    Timeout,
}

/// What kind of lifecycle moment this event records.
///
/// `Started` is reserved for forward compatibility; the wrapper only ever
/// emits `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "invocation.started")]
    Started,
    #[serde(rename = "invocation.completed")]
    Completed,
    #[serde(rename = "invocation.failed")]
    Failed,
}

/// One telemetry record, enqueued on the transport after an invocation ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_id: String,
    pub invocation_id: String,
    pub event_version: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,

    pub api_key: String,
    pub agent_id: String,
    pub agent_name: Option<String>,
    pub model_id: String,
    pub region: String,

    /// Present only when the caller supplied one via `ObserveBuilder::session_id`.
    pub session_id: Option<String>,
    /// Present only when the caller supplied one via `ObserveBuilder::user_id`.
    pub user_id: Option<String>,

    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,

    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost_usd: f64,

    pub status: InvocationStatus,
    pub error_message: Option<String>,
    pub error_type: Option<String>,

    pub tools_called: Vec<String>,

    pub prompt_summary: Option<String>,
    pub prompt_fingerprint: Option<PromptFingerprint>,
    /// Truncated stringified return value of the user function.
    pub response_summary: Option<String>,

    pub spans: Vec<Span>,

    pub sdk_version: String,
    pub tags: HashMap<String, String>,
}

/// Truncate `s` to `MAX_SUMMARY_LENGTH` characters without an ellipsis
/// marker, per §3's `prompt_summary`/`error_message` semantics.
#[must_use]
pub fn truncate_summary(s: &str) -> String {
    if s.chars().count() <= MAX_SUMMARY_LENGTH {
        s.to_string()
    } else {
        s.chars().take(MAX_SUMMARY_LENGTH).collect()
    }
}

/// Parameters for assembling a [`TelemetryEvent`] once an invocation has
/// finished. Grouped into one struct since the wrapper collects these
/// values across several harvest steps before it can build the event.
#[derive(Debug, Clone)]
pub struct TelemetryEventInput {
    pub invocation_id: String,
    pub api_key: String,
    pub agent_id: String,
    pub agent_name: Option<String>,
    pub model_id: String,
    pub region: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost_usd: f64,
    pub status: InvocationStatus,
    pub error_message: Option<String>,
    pub error_type: Option<String>,
    pub tools_called: Vec<String>,
    pub prompt_summary: Option<String>,
    pub prompt_fingerprint: Option<PromptFingerprint>,
    pub response_summary: Option<String>,
    pub spans: Vec<Span>,
    pub tags: HashMap<String, String>,
}

impl TelemetryEvent {
    /// Build a fresh event, generating `event_id` and stamping the current
    /// timestamp and SDK/event schema versions.
    #[must_use]
    pub fn new(input: TelemetryEventInput) -> Self {
        let event_type = match input.status {
            InvocationStatus::Success => EventType::Completed,
            InvocationStatus::Failure | InvocationStatus::Timeout => EventType::Failed,
        };

        Self {
            event_id: Uuid::new_v4().to_string(),
            invocation_id: input.invocation_id,
            event_version: EVENT_VERSION.to_string(),
            timestamp: Utc::now(),
            event_type,
            api_key: input.api_key,
            agent_id: input.agent_id,
            agent_name: input.agent_name,
            model_id: input.model_id,
            region: input.region,
            session_id: input.session_id,
            user_id: input.user_id,
            started_at: input.started_at,
            ended_at: input.ended_at,
            duration_ms: input.duration_ms,
            input_tokens: input.input_tokens,
            output_tokens: input.output_tokens,
            estimated_cost_usd: input.estimated_cost_usd,
            status: input.status,
            error_message: input.error_message.map(|m| truncate_summary(&m)),
            error_type: input.error_type,
            tools_called: input.tools_called,
            prompt_summary: input.prompt_summary.map(|p| truncate_summary(&p)),
            prompt_fingerprint: input.prompt_fingerprint,
            response_summary: input.response_summary.map(|r| truncate_summary(&r)),
            spans: input.spans,
            sdk_version: SDK_VERSION.to_string(),
            tags: input.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> TelemetryEventInput {
        TelemetryEventInput {
            invocation_id: "inv-1".to_string(),
            api_key: "key".to_string(),
            agent_id: "agent-1".to_string(),
            agent_name: None,
            model_id: "anthropic.claude-3-haiku".to_string(),
            region: "us-east-1".to_string(),
            session_id: None,
            user_id: None,
            started_at: Utc::now(),
            ended_at: Utc::now(),
            duration_ms: 12,
            input_tokens: 100,
            output_tokens: 200,
            estimated_cost_usd: 0.000275,
            status: InvocationStatus::Success,
            error_message: None,
            error_type: None,
            tools_called: Vec::new(),
            prompt_summary: None,
            prompt_fingerprint: None,
            response_summary: None,
            spans: Vec::new(),
            tags: HashMap::new(),
        }
    }

    #[test]
    fn success_maps_to_completed_event_type() {
        let event = TelemetryEvent::new(base_input());
        assert_eq!(event.event_type, EventType::Completed);
        assert_eq!(event.event_version, EVENT_VERSION);
    }

    #[test]
    fn failure_maps_to_failed_event_type() {
        let mut input = base_input();
        input.status = InvocationStatus::Failure;
        let event = TelemetryEvent::new(input);
        assert_eq!(event.event_type, EventType::Failed);
    }

    #[test]
    fn long_error_message_is_truncated() {
        let mut input = base_input();
        input.error_message = Some("x".repeat(1000));
        let event = TelemetryEvent::new(input);
        assert_eq!(event.error_message.unwrap().chars().count(), MAX_SUMMARY_LENGTH);
    }

    #[test]
    fn short_summary_is_untouched() {
        let short = "hi".to_string();
        assert_eq!(truncate_summary(&short), short);
    }
}
