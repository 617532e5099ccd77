//! Structural fingerprinting of prompt strings for drift detection.
//!
//! Deterministic and side-effect-free: the empty prompt always yields the
//! empty-byte-string hash and all-zero counts.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

fn template_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([A-Za-z_]\w*)\}").expect("static pattern is valid"))
}

/// A structural fingerprint of a prompt string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptFingerprint {
    /// SHA-256 of the prompt after `strip` + lowercase normalization.
    pub prompt_hash: String,
    /// SHA-256 of the skeleton with `{name}` placeholders replaced by `{VAR}`.
    pub structure_hash: String,
    /// Character count of the raw (unnormalized) prompt.
    pub char_count: usize,
    /// Whitespace-split word count of the raw prompt.
    pub word_count: usize,
    /// Count of `\n` plus one.
    pub line_count: usize,
    /// Sorted, deduplicated `{name}` placeholder identifiers.
    pub template_vars: Vec<String>,
}

fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Compute the structural fingerprint of a prompt string.
///
/// The empty prompt yields hashes of the empty byte string and all counts
/// equal to zero.
#[must_use]
pub fn compute_fingerprint(prompt: &str) -> PromptFingerprint {
    if prompt.is_empty() {
        let empty_hash = sha256_hex("");
        return PromptFingerprint {
            prompt_hash: empty_hash.clone(),
            structure_hash: empty_hash,
            char_count: 0,
            word_count: 0,
            line_count: 0,
            template_vars: Vec::new(),
        };
    }

    let normalized = prompt.trim().to_lowercase();
    let prompt_hash = sha256_hex(&normalized);

    let mut template_vars: Vec<String> = template_var_pattern()
        .captures_iter(prompt)
        .map(|c| c[1].to_string())
        .collect();
    template_vars.sort_unstable();
    template_vars.dedup();

    let skeleton = template_var_pattern().replace_all(&normalized, "{VAR}");
    let structure_hash = sha256_hex(&skeleton);

    PromptFingerprint {
        prompt_hash,
        structure_hash,
        char_count: prompt.chars().count(),
        word_count: prompt.split_whitespace().count(),
        line_count: prompt.matches('\n').count() + 1,
        template_vars,
    }
}

/// Compare two fingerprints and return a similarity score in `[0.0, 1.0]`.
///
/// `1.0` for an exact `prompt_hash` match, `0.9` for a `structure_hash`
/// match with differing `prompt_hash` (same template, different values),
/// otherwise the mean of three clamped per-metric ratios.
#[must_use]
pub fn compute_similarity(a: &PromptFingerprint, b: &PromptFingerprint) -> f64 {
    if a.prompt_hash == b.prompt_hash {
        return 1.0;
    }
    if a.structure_hash == b.structure_hash {
        return 0.9;
    }

    let ratio = |va: usize, vb: usize| -> f64 {
        let max_val = va.max(vb);
        if max_val == 0 {
            1.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let diff = (va as f64 - vb as f64).abs();
            #[allow(clippy::cast_precision_loss)]
            let max_f = max_val as f64;
            1.0 - diff / max_f
        }
    };

    let ratios = [
        ratio(a.char_count, b.char_count),
        ratio(a.word_count, b.word_count),
        ratio(a.line_count, b.line_count),
    ];
    let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
    mean.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prompt_yields_zeroed_fingerprint() {
        let fp = compute_fingerprint("");
        assert_eq!(fp.char_count, 0);
        assert_eq!(fp.word_count, 0);
        assert_eq!(fp.line_count, 0);
        assert!(fp.template_vars.is_empty());
        assert_eq!(fp.prompt_hash, fp.structure_hash);
    }

    #[test]
    fn same_skeleton_different_values_share_structure_hash() {
        let a = compute_fingerprint("Hello {name}");
        let b = compute_fingerprint("Hello {user}");
        assert_eq!(a.structure_hash, b.structure_hash);
        assert_ne!(a.prompt_hash, b.prompt_hash);
        assert!((compute_similarity(&a, &b) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn identical_prompts_are_perfectly_similar() {
        let a = compute_fingerprint("Same prompt");
        let b = compute_fingerprint("Same prompt");
        assert_eq!(compute_similarity(&a, &b), 1.0);
    }

    #[test]
    fn json_like_prompt_has_no_template_vars() {
        let fp = compute_fingerprint(r#"{"key": "value"}"#);
        assert!(fp.template_vars.is_empty());
    }

    #[test]
    fn template_vars_are_sorted_and_deduped() {
        let fp = compute_fingerprint("{b} and {a} and {b} again");
        assert_eq!(fp.template_vars, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn line_count_counts_newlines_plus_one() {
        let fp = compute_fingerprint("line one\nline two\nline three");
        assert_eq!(fp.line_count, 3);
    }

    #[test]
    fn normalization_strips_and_lowercases_before_hashing() {
        let a = compute_fingerprint("  Hello World  ");
        let b = compute_fingerprint("hello world");
        assert_eq!(a.prompt_hash, b.prompt_hash);
    }
}
