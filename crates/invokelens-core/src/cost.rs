//! Static model pricing and cost estimation.
//!
//! Resolution order: process-wide custom overrides, then the static
//! pricing table below, then a generic default. Treated as configuration
//! data per the SDK's scope — the table itself is not meant to be
//! exhaustive, just representative of the managed-LLM providers the SDK
//! is embedded against.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// Per-1,000-token input/output rate, in USD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRate {
    /// USD per 1,000 input tokens.
    pub input_per_1k: f64,
    /// USD per 1,000 output tokens.
    pub output_per_1k: f64,
}

const DEFAULT_RATE: ModelRate = ModelRate {
    input_per_1k: 0.003,
    output_per_1k: 0.015,
};

fn static_pricing() -> &'static HashMap<&'static str, ModelRate> {
    static TABLE: OnceLock<HashMap<&'static str, ModelRate>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            (
                "anthropic.claude-3-5-sonnet",
                ModelRate { input_per_1k: 0.003, output_per_1k: 0.015 },
            ),
            (
                "anthropic.claude-3-sonnet",
                ModelRate { input_per_1k: 0.003, output_per_1k: 0.015 },
            ),
            (
                "anthropic.claude-3-haiku",
                ModelRate { input_per_1k: 0.00025, output_per_1k: 0.00125 },
            ),
            (
                "anthropic.claude-3-opus",
                ModelRate { input_per_1k: 0.015, output_per_1k: 0.075 },
            ),
            (
                "amazon.titan-text-lite-v1",
                ModelRate { input_per_1k: 0.0003, output_per_1k: 0.0004 },
            ),
            (
                "amazon.titan-text-express-v1",
                ModelRate { input_per_1k: 0.0008, output_per_1k: 0.0016 },
            ),
            (
                "meta.llama3-70b-instruct-v1",
                ModelRate { input_per_1k: 0.00265, output_per_1k: 0.0035 },
            ),
            (
                "meta.llama3-8b-instruct-v1",
                ModelRate { input_per_1k: 0.0003, output_per_1k: 0.0006 },
            ),
            (
                "mistral.mistral-large",
                ModelRate { input_per_1k: 0.004, output_per_1k: 0.012 },
            ),
            (
                "mistral.mistral-small",
                ModelRate { input_per_1k: 0.001, output_per_1k: 0.003 },
            ),
            (
                "cohere.command-r-plus-v1",
                ModelRate { input_per_1k: 0.003, output_per_1k: 0.015 },
            ),
        ])
    })
}

fn custom_pricing() -> &'static RwLock<HashMap<String, ModelRate>> {
    static OVERRIDES: OnceLock<RwLock<HashMap<String, ModelRate>>> = OnceLock::new();
    OVERRIDES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Override the pricing used for a specific model id, process-wide.
///
/// Takes precedence over the static table for every subsequent
/// [`estimate_cost`] call until the process exits or [`reset_custom_pricing`]
/// is called.
pub fn set_custom_pricing(model_id: impl Into<String>, input_per_1k: f64, output_per_1k: f64) {
    if let Ok(mut overrides) = custom_pricing().write() {
        overrides.insert(model_id.into(), ModelRate { input_per_1k, output_per_1k });
    }
}

/// Clear all custom pricing overrides. Intended for test isolation.
pub fn reset_custom_pricing() {
    if let Ok(mut overrides) = custom_pricing().write() {
        overrides.clear();
    }
}

fn resolve_rate(model_id: &str) -> ModelRate {
    if let Ok(overrides) = custom_pricing().read() {
        if let Some(rate) = overrides.get(model_id) {
            return *rate;
        }
    }
    static_pricing().get(model_id).copied().unwrap_or(DEFAULT_RATE)
}

/// Estimate cost in USD for an invocation, rounded to 8 decimal places.
///
/// Non-decreasing in `input_tokens` and `output_tokens` for a fixed
/// `model_id`, since both terms of the formula are monotonic.
#[must_use]
pub fn estimate_cost(model_id: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let rate = resolve_rate(model_id);
    #[allow(clippy::cast_precision_loss)]
    let input_cost = (input_tokens as f64 / 1000.0) * rate.input_per_1k;
    #[allow(clippy::cast_precision_loss)]
    let output_cost = (output_tokens as f64 / 1000.0) * rate.output_per_1k;
    let raw = input_cost + output_cost;
    (raw * 1e8).round() / 1e8
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test_helper::with_pricing_lock;

    mod serial_test_helper {
        use std::sync::{Mutex, OnceLock};

        /// Custom pricing is process-wide; serialize tests that touch it.
        pub fn with_pricing_lock<F: FnOnce()>(f: F) {
            static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
            let guard = LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
            f();
            drop(guard);
        }
    }

    #[test]
    fn known_model_pricing() {
        with_pricing_lock(|| {
            super::reset_custom_pricing();
            let cost = estimate_cost("anthropic.claude-3-haiku", 500, 200);
            assert!((cost - 0.000375).abs() < 1e-12);
        });
    }

    #[test]
    fn unknown_model_falls_back_to_default() {
        with_pricing_lock(|| {
            super::reset_custom_pricing();
            let cost = estimate_cost("some.unknown-model", 1000, 1000);
            assert!((cost - (DEFAULT_RATE.input_per_1k + DEFAULT_RATE.output_per_1k)).abs() < 1e-12);
        });
    }

    #[test]
    fn custom_pricing_overrides_static_table() {
        with_pricing_lock(|| {
            super::reset_custom_pricing();
            set_custom_pricing("anthropic.claude-3-haiku", 1.0, 1.0);
            let cost = estimate_cost("anthropic.claude-3-haiku", 1000, 1000);
            assert!((cost - 2.0).abs() < 1e-12);
            super::reset_custom_pricing();
        });
    }

    #[test]
    fn cost_is_monotonic_in_tokens() {
        with_pricing_lock(|| {
            super::reset_custom_pricing();
            let low = estimate_cost("anthropic.claude-3-sonnet", 100, 100);
            let high = estimate_cost("anthropic.claude-3-sonnet", 200, 300);
            assert!(high >= low);
        });
    }

    #[test]
    fn rounds_to_eight_decimals() {
        with_pricing_lock(|| {
            super::reset_custom_pricing();
            let cost = estimate_cost("anthropic.claude-3-opus", 1, 1);
            let text = format!("{cost:.10}");
            let decimals = text.split('.').nth(1).unwrap();
            assert!(decimals.trim_end_matches('0').len() <= 8);
        });
    }
}
