//! Guardrail policy records as received from the status/policy backend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of guardrail a policy enforces.
///
/// Any `policy_type` the backend sends that does not match one of these is
/// deserialized as [`PolicyType::Other`] and ignored during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyType {
    #[serde(rename = "COST_CAP")]
    CostCap,
    #[serde(rename = "TOKEN_LIMIT")]
    TokenLimit,
    #[serde(rename = "RATE_LIMIT")]
    RateLimit,
    #[serde(rename = "TIME_RESTRICTION")]
    TimeRestriction,
    /// Any other value. Evaluated as always-pass.
    #[serde(other)]
    Other,
}

/// Whether a matching policy blocks the invocation or only logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Enforcement {
    /// Raise `PolicyViolation` on match.
    #[serde(rename = "BLOCK")]
    Block,
    /// Evaluate but never raise.
    #[serde(rename = "LOG")]
    Log,
}

/// A single guardrail policy, as returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub policy_id: String,
    pub policy_type: PolicyType,
    pub enforcement: Enforcement,
    /// Recognized keys depend on `policy_type`; see [`PolicyType`] variants.
    #[serde(default)]
    pub conditions: HashMap<String, serde_json::Value>,
}

impl PolicyRecord {
    /// A string label for this policy's type, used in violation messages.
    #[must_use]
    pub fn type_label(&self) -> &'static str {
        match self.policy_type {
            PolicyType::CostCap => "COST_CAP",
            PolicyType::TokenLimit => "TOKEN_LIMIT",
            PolicyType::RateLimit => "RATE_LIMIT",
            PolicyType::TimeRestriction => "TIME_RESTRICTION",
            PolicyType::Other => "OTHER",
        }
    }

    /// Read a numeric condition, accepting either a JSON number or string.
    #[must_use]
    pub fn condition_f64(&self, key: &str) -> Option<f64> {
        let value = self.conditions.get(key)?;
        value.as_f64().or_else(|| value.as_str().and_then(|s| s.parse().ok()))
    }

    /// Read a pair of `[start, end]` integers (used by `allowed_hours_utc`).
    #[must_use]
    pub fn condition_range(&self, key: &str) -> Option<(i64, i64)> {
        let value = self.conditions.get(key)?.as_array()?;
        if value.len() != 2 {
            return None;
        }
        let start = value[0].as_i64()?;
        let end = value[1].as_i64()?;
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_policy_type_is_ignored() {
        let record: PolicyRecord = serde_json::from_value(json!({
            "policy_id": "p1",
            "policy_type": "SOME_FUTURE_TYPE",
            "enforcement": "BLOCK",
            "conditions": {},
        }))
        .unwrap();
        assert_eq!(record.policy_type, PolicyType::Other);
    }

    #[test]
    fn condition_f64_reads_numeric_value() {
        let record: PolicyRecord = serde_json::from_value(json!({
            "policy_id": "p1",
            "policy_type": "COST_CAP",
            "enforcement": "BLOCK",
            "conditions": {"max_cost_usd": 0.5},
        }))
        .unwrap();
        assert_eq!(record.condition_f64("max_cost_usd"), Some(0.5));
    }

    #[test]
    fn condition_range_reads_pair() {
        let record: PolicyRecord = serde_json::from_value(json!({
            "policy_id": "p1",
            "policy_type": "TIME_RESTRICTION",
            "enforcement": "BLOCK",
            "conditions": {"allowed_hours_utc": [9, 17]},
        }))
        .unwrap();
        assert_eq!(record.condition_range("allowed_hours_utc"), Some((9, 17)));
    }
}
