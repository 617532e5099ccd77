//! Guardrail errors the SDK is allowed to raise to the caller.

use thiserror::Error;

/// The two deliberate, caller-visible errors the invocation wrapper can raise.
///
/// Everything else the SDK encounters internally (status lookups, policy
/// evaluation, fingerprinting, trace harvesting, transport enqueue) is
/// suppressed at its phase boundary and never reaches this type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GuardrailError {
    /// Raised when the kill switch reports the agent as blocked.
    #[error("agent '{agent_id}' is blocked: {reason}")]
    AgentBlocked {
        /// The agent that was blocked.
        agent_id: String,
        /// The backend-supplied reason, or a generic fallback.
        reason: String,
    },

    /// Raised when a BLOCK-enforced policy matches the invocation.
    #[error("policy violation for agent '{agent_id}': [{policy_type}] {message} (policy_id={policy_id})")]
    PolicyViolation {
        /// The agent the policy was evaluated against.
        agent_id: String,
        /// The identifier of the violated policy.
        policy_id: String,
        /// The policy type that matched (`COST_CAP`, `TOKEN_LIMIT`, ...).
        policy_type: String,
        /// Human-readable description of the violation.
        message: String,
    },
}

impl GuardrailError {
    /// Construct an [`GuardrailError::AgentBlocked`], defaulting the reason.
    #[must_use]
    pub fn agent_blocked(agent_id: impl Into<String>, reason: Option<String>) -> Self {
        Self::AgentBlocked {
            agent_id: agent_id.into(),
            reason: reason.unwrap_or_else(|| "agent is blocked".to_string()),
        }
    }
}
