//! The invocation wrapper: kill-switch check, policy evaluation, trace
//! lifecycle, and post-invocation telemetry harvest.

use crate::client::InvokeLensClient;
use crate::config::resolve_region;
use crate::error::InvokeError;
use crate::harvest;
use crate::policy_eval;
use crate::rate_tracker::RateTracker;
use chrono::Utc;
use invokelens_core::error::GuardrailError;
use invokelens_core::event::{truncate_summary, InvocationStatus, TelemetryEvent, TelemetryEventInput, UNKNOWN_MODEL_ID};
use invokelens_core::fingerprint::compute_fingerprint;
use invokelens_core::span::{SpanStatus, SpanType, TraceContext};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Builds one call through the invocation wrapper for a single agent.
///
/// Constructed via [`InvokeLensClient::observe`]. Consumed by `.call` or
/// `.call_with_trace`; there is no reflection over the user function's
/// signature, so the two methods stand in for "accepts a trace parameter
/// or doesn't".
pub struct ObserveBuilder<'a> {
    client: &'a InvokeLensClient,
    agent_id: String,
    agent_name: Option<String>,
    model_id: String,
    session_id: Option<String>,
    user_id: Option<String>,
    prompt: Option<String>,
    tags: HashMap<String, String>,
}

impl<'a> ObserveBuilder<'a> {
    pub(crate) fn new(client: &'a InvokeLensClient, agent_id: impl Into<String>) -> Self {
        Self {
            client,
            agent_id: agent_id.into(),
            agent_name: None,
            model_id: UNKNOWN_MODEL_ID.to_string(),
            session_id: None,
            user_id: None,
            prompt: None,
            tags: HashMap::new(),
        }
    }

    /// A human-readable agent name, used as the root span's name when set.
    #[must_use]
    pub fn agent_name(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    /// The model id this invocation targets, used for cost estimation and
    /// cost-cap evaluation unless the response itself reports one. Left
    /// unset, it defaults to `"unknown"` rather than staying absent, so
    /// cost estimation always has a pricing key to resolve.
    #[must_use]
    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Opaque session identifier, carried through to the telemetry event.
    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Opaque user identifier, carried through to the telemetry event.
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// The prompt text for this invocation. Drives `prompt_summary` and
    /// `prompt_fingerprint`; left unset, both stay `None`.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Attach a freeform tag to the emitted telemetry event.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Run `f`, which does not need the invocation's [`TraceContext`].
    pub async fn call<F, Fut, T, E>(self, f: F) -> Result<T, InvokeError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize,
        E: fmt::Display + 'static,
    {
        self.call_with_trace(move |_trace| f()).await
    }

    /// Run `f`, passing it the invocation's [`TraceContext`] so it can open
    /// nested spans (typically via [`crate::tool::ToolBuilder`]).
    pub async fn call_with_trace<F, Fut, T, E>(self, f: F) -> Result<T, InvokeError<E>>
    where
        F: FnOnce(Arc<TraceContext>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize,
        E: fmt::Display + 'static,
    {
        let Self { client, agent_id, agent_name, model_id, session_id, user_id, prompt, tags } = self;

        // Phase 1: kill-switch check.
        let agent_status = if client.config().enable_kill_switch {
            client.cache().lookup(&agent_id).await
        } else {
            invokelens_cache::AgentStatus::default()
        };

        if agent_status.blocked {
            debug!(agent_id = %agent_id, reason = ?agent_status.blocked_reason, "kill switch blocked invocation");
            return Err(GuardrailError::agent_blocked(agent_id, agent_status.blocked_reason).into());
        }

        // Phase 2: policy evaluation.
        if let Some(violation) = policy_eval::evaluate_policies(&agent_id, Some(model_id.as_str()), &agent_status.policies) {
            warn!(agent_id = %agent_id, policy = %violation, "policy violation blocked invocation");
            return Err(violation.into());
        }

        // Phase 3: trace setup.
        let trace = Arc::new(TraceContext::new());
        let span_name = agent_name.clone().unwrap_or_else(|| agent_id.clone());
        let root_span = trace.start_span(span_name, SpanType::Chain, prompt.clone(), Some(model_id.clone()));

        // Phase 4: user invocation.
        let started_at = Utc::now();
        let start_instant = Instant::now();
        let result = f(trace.clone()).await;
        let ended_at = Utc::now();
        #[allow(clippy::cast_possible_wrap)]
        let duration_ms = start_instant.elapsed().as_millis() as i64;

        // Phase 5: post-invocation harvest. Runs on every exit path.
        let (invocation_status, error_type, error_message, response_value) = match &result {
            Ok(value) => (InvocationStatus::Success, None, None, serde_json::to_value(value).ok()),
            Err(err) => (
                InvocationStatus::Failure,
                Some(std::any::type_name::<E>().to_string()),
                Some(err.to_string()),
                None,
            ),
        };

        let (input_tokens, output_tokens, resolved_model_id, response_summary) = match &response_value {
            Some(value) => {
                harvest::harvest_provider_trace(&trace, value);
                let (input_tokens, output_tokens) = harvest::extract_tokens(value);
                let model = harvest::extract_model_id(value, &model_id);
                (input_tokens, output_tokens, model, Some(harvest::response_summary(value)))
            }
            None => (0, 0, model_id.clone(), None),
        };

        let span_status = if result.is_ok() { SpanStatus::Ok } else { SpanStatus::Error };
        trace.end_span(
            root_span,
            response_summary.clone(),
            span_status,
            error_message.clone(),
            input_tokens,
            output_tokens,
            Some(resolved_model_id.clone()),
        );

        let tools_called = trace.tool_names();
        let prompt_fingerprint = prompt.as_deref().map(compute_fingerprint);
        let prompt_summary = prompt.as_deref().map(truncate_summary);
        let estimated_cost_usd = invokelens_core::cost::estimate_cost(&resolved_model_id, input_tokens, output_tokens);

        RateTracker::global().record(&agent_id);

        let event = TelemetryEvent::new(TelemetryEventInput {
            invocation_id: Uuid::new_v4().to_string(),
            api_key: client.config().api_key.clone(),
            agent_id,
            agent_name,
            model_id: resolved_model_id,
            region: resolve_region(),
            session_id,
            user_id,
            started_at,
            ended_at,
            duration_ms,
            input_tokens,
            output_tokens,
            estimated_cost_usd,
            status: invocation_status,
            error_message,
            error_type,
            tools_called,
            prompt_summary,
            prompt_fingerprint,
            response_summary,
            spans: trace.spans(),
            tags,
        });
        client.transport().send(&event);

        result.map_err(InvokeError::User)
    }
}
