//! Phase 2 of the invocation wrapper: evaluating BLOCK-enforced guardrail
//! policies against an about-to-happen invocation.

use crate::rate_tracker::RateTracker;
use chrono::{Timelike, Utc};
use invokelens_core::cost::estimate_cost;
use invokelens_core::error::GuardrailError;
use invokelens_core::policy::{Enforcement, PolicyRecord, PolicyType};

/// The cost estimator's "typical profile" used by the cost-cap check: a
/// representative invocation shape, not the actual token counts (those
/// aren't known until after the user function returns).
const TYPICAL_INPUT_TOKENS: u64 = 500;
const TYPICAL_OUTPUT_TOKENS: u64 = 200;

const DEFAULT_WINDOW_MINUTES: f64 = 60.0;

/// Evaluate every `BLOCK`-enforced policy in order, returning the first
/// violation. `LOG`-enforced policies are evaluated for nothing but their
/// own sake (they never affect the outcome), so they're skipped entirely.
pub fn evaluate_policies(agent_id: &str, model_id: Option<&str>, policies: &[PolicyRecord]) -> Option<GuardrailError> {
    for policy in policies {
        if policy.enforcement != Enforcement::Block {
            continue;
        }
        let violation = match policy.policy_type {
            PolicyType::CostCap => evaluate_cost_cap(model_id, policy),
            PolicyType::TokenLimit => evaluate_token_limit(policy),
            PolicyType::RateLimit => evaluate_rate_limit(agent_id, policy),
            PolicyType::TimeRestriction => evaluate_time_restriction(policy),
            PolicyType::Other => None,
        };
        if let Some(message) = violation {
            return Some(GuardrailError::PolicyViolation {
                agent_id: agent_id.to_string(),
                policy_id: policy.policy_id.clone(),
                policy_type: policy.type_label().to_string(),
                message,
            });
        }
    }
    None
}

fn evaluate_cost_cap(model_id: Option<&str>, policy: &PolicyRecord) -> Option<String> {
    let cap = policy.condition_f64("max_cost_usd")?;
    let estimate = estimate_cost(model_id.unwrap_or(""), TYPICAL_INPUT_TOKENS, TYPICAL_OUTPUT_TOKENS);
    (estimate > cap).then(|| format!("estimated cost {estimate} exceeds cap {cap}"))
}

fn evaluate_token_limit(policy: &PolicyRecord) -> Option<String> {
    let max_tokens = policy.condition_f64("max_tokens")?;
    let estimated_input_tokens = policy.condition_f64("estimated_input_tokens").unwrap_or(0.0);
    (estimated_input_tokens != 0.0 && estimated_input_tokens > max_tokens)
        .then(|| format!("estimated input tokens {estimated_input_tokens} exceeds limit {max_tokens}"))
}

fn evaluate_rate_limit(agent_id: &str, policy: &PolicyRecord) -> Option<String> {
    let max_invocations = policy.condition_f64("max_invocations")?;
    let window_minutes = policy.condition_f64("window_minutes").unwrap_or(DEFAULT_WINDOW_MINUTES);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let window_seconds = (window_minutes * 60.0) as u64;
    let count = RateTracker::global().count_in_window(agent_id, window_seconds);
    #[allow(clippy::cast_precision_loss)]
    let count_f64 = count as f64;
    (count_f64 >= max_invocations)
        .then(|| format!("{count} invocations in the last {window_minutes} minutes reached the limit of {max_invocations}"))
}

fn evaluate_time_restriction(policy: &PolicyRecord) -> Option<String> {
    let (start, end) = policy.condition_range("allowed_hours_utc")?;
    let hour = i64::from(Utc::now().hour());
    (!(start <= hour && hour < end)).then(|| format!("current UTC hour {hour} is outside allowed window [{start}, {end})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_tracker::RateTracker;
    use invokelens_core::policy::PolicyRecord;
    use serde_json::json;

    fn policy(policy_type: &str, conditions: serde_json::Value) -> PolicyRecord {
        serde_json::from_value(json!({
            "policy_id": "p1",
            "policy_type": policy_type,
            "enforcement": "BLOCK",
            "conditions": conditions,
        }))
        .unwrap()
    }

    #[test]
    fn cost_cap_violation_matches_scenario_s5() {
        let p = policy("COST_CAP", json!({"max_cost_usd": 0.00001}));
        let violation = evaluate_policies("agent-1", Some("anthropic.claude-3-haiku"), &[p]);
        assert!(violation.is_some());
    }

    #[test]
    fn cost_cap_passes_when_under_the_cap() {
        let p = policy("COST_CAP", json!({"max_cost_usd": 10.0}));
        let violation = evaluate_policies("agent-1", Some("anthropic.claude-3-haiku"), &[p]);
        assert!(violation.is_none());
    }

    #[test]
    fn token_limit_only_fires_when_estimate_is_nonzero() {
        let p = policy("TOKEN_LIMIT", json!({"max_tokens": 100, "estimated_input_tokens": 0}));
        assert!(evaluate_policies("agent-1", None, &[p]).is_none());

        let p = policy("TOKEN_LIMIT", json!({"max_tokens": 100, "estimated_input_tokens": 500}));
        assert!(evaluate_policies("agent-1", None, &[p]).is_some());
    }

    #[test]
    fn time_restriction_rejects_outside_window() {
        let p = policy("TIME_RESTRICTION", json!({"allowed_hours_utc": [0, 0]}));
        assert!(evaluate_policies("agent-1", None, &[p]).is_some());
    }

    #[test]
    fn log_enforcement_never_blocks() {
        let p: PolicyRecord = serde_json::from_value(json!({
            "policy_id": "p1",
            "policy_type": "COST_CAP",
            "enforcement": "LOG",
            "conditions": {"max_cost_usd": 0.0},
        }))
        .unwrap();
        assert!(evaluate_policies("agent-1", Some("anthropic.claude-3-haiku"), &[p]).is_none());
    }

    #[test]
    fn unknown_policy_type_is_ignored() {
        let p = policy("SOMETHING_NEW", json!({}));
        assert!(evaluate_policies("agent-1", None, &[p]).is_none());
    }

    #[test]
    fn rate_limit_matches_scenario_s4() {
        let tracker = RateTracker::global();
        tracker.reset();
        let p = policy("RATE_LIMIT", json!({"max_invocations": 2, "window_minutes": 60}));

        // No prior invocations recorded yet: first two calls should pass.
        assert!(evaluate_policies("agent-s4", None, &[p.clone()]).is_none());
        tracker.record("agent-s4");
        assert!(evaluate_policies("agent-s4", None, &[p.clone()]).is_none());
        tracker.record("agent-s4");
        // Third call: two invocations already recorded, at the limit.
        assert!(evaluate_policies("agent-s4", None, &[p]).is_some());
    }
}
