//! Heuristic similarity ranking of model identifiers.
//!
//! Used to suggest loaded alternatives when a requested model is not
//! available. Scoring is a handful of additive token heuristics, not an
//! edit distance:
//!
//! | rule | bonus |
//! |---|---|
//! | exact match (case-insensitive) | 1.0 |
//! | same first token ("family") | 0.5 |
//! | each shared size/quant/variant marker | 0.2 |
//! | token overlap | `shared / max(len) × 0.3` |
//!
//! Bonuses accumulate (an exact match also collects the others) and the
//! total is clamped to 1.0.

use std::collections::HashSet;

use serde::Serialize;

/// Maximum number of candidates returned by [`rank()`].
pub const MAX_SUGGESTIONS: usize = 5;

/// Candidates scoring at or below this are dropped.
pub const MIN_SCORE: f64 = 0.1;

/// Size, quantization and variant markers, matched by substring.
const SUFFIX_MARKERS: &[&str] = &[
    "3b", "7b", "13b", "70b", "q4", "q8", "instruct", "chat", "base",
];

const EXACT_BONUS: f64 = 1.0;
const FAMILY_BONUS: f64 = 0.5;
const SUFFIX_BONUS: f64 = 0.2;
const OVERLAP_WEIGHT: f64 = 0.3;

/// A ranked alternative for a requested model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityCandidate {
    pub model_id: String,
    /// In `(0.1, 1.0]` for candidates returned by [`rank()`].
    pub score: f64,
    /// Rules that contributed, in the order they fired.
    pub matched_reasons: Vec<String>,
}

impl SimilarityCandidate {
    /// Reasons joined with `", "`.
    pub fn reasons_summary(&self) -> String {
        self.matched_reasons.join(", ")
    }
}

/// Rank `candidates` by similarity to `target`.
///
/// Returns at most [`MAX_SUGGESTIONS`] entries scoring above
/// [`MIN_SCORE`], best first. Equal scores keep their input order.
///
/// ```rust
/// # use huginn::similarity::rank;
/// let ranked = rank("qwen3-8b-instruct", &["qwen3-14b-instruct", "llama-3.2-3b"]);
/// assert_eq!(ranked.len(), 1);
/// assert_eq!(ranked[0].model_id, "qwen3-14b-instruct");
/// ```
pub fn rank<S: AsRef<str>>(target: &str, candidates: &[S]) -> Vec<SimilarityCandidate> {
    let mut scored: Vec<SimilarityCandidate> = candidates
        .iter()
        .map(|c| score(target, c.as_ref()))
        .filter(|c| c.score > MIN_SCORE)
        .collect();
    // stable: ties keep input order
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(MAX_SUGGESTIONS);
    scored
}

/// Score a single candidate against `target`.
pub fn score(target: &str, candidate: &str) -> SimilarityCandidate {
    let target_lower = target.to_lowercase();
    let candidate_lower = candidate.to_lowercase();
    let target_tokens = tokenize(&target_lower);
    let candidate_tokens = tokenize(&candidate_lower);

    let mut score = 0.0;
    let mut reasons = Vec::new();

    if target_lower == candidate_lower {
        score += EXACT_BONUS;
        reasons.push("Exact match".to_string());
    }

    if let (Some(family), Some(other)) = (target_tokens.first(), candidate_tokens.first())
        && family == other
    {
        score += FAMILY_BONUS;
        reasons.push(format!("Same model family ({family})"));
    }

    for marker in SUFFIX_MARKERS {
        if target_lower.contains(marker) && candidate_lower.contains(marker) {
            score += SUFFIX_BONUS;
            reasons.push(format!("Shared variant: {marker}"));
        }
    }

    let target_set: HashSet<&str> = target_tokens.iter().copied().collect();
    let candidate_set: HashSet<&str> = candidate_tokens.iter().copied().collect();
    let shared = target_set.intersection(&candidate_set).count();
    let largest = target_set.len().max(candidate_set.len());
    if shared > 0 && largest > 0 {
        score += shared as f64 / largest as f64 * OVERLAP_WEIGHT;
        reasons.push(format!("Token overlap ({shared}/{largest})"));
    }

    SimilarityCandidate {
        model_id: candidate.to_string(),
        score: score.min(1.0),
        matched_reasons: reasons,
    }
}

/// Split on `-`, `_` and whitespace, dropping empty pieces.
fn tokenize(s: &str) -> Vec<&str> {
    s.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_separators() {
        assert_eq!(
            tokenize("qwen/qwen3-30b_instruct  q4"),
            vec!["qwen/qwen3", "30b", "instruct", "q4"]
        );
        assert!(tokenize("--__").is_empty());
    }

    #[test]
    fn exact_match_collects_other_bonuses_and_clamps() {
        let c = score("Llama-3-8B-Instruct", "llama-3-8b-instruct");
        assert_eq!(c.score, 1.0);
        assert_eq!(c.matched_reasons[0], "Exact match");
        assert!(c.matched_reasons.len() > 1);
    }

    #[test]
    fn reasons_follow_rule_order() {
        let c = score("mistral-7b-instruct", "mistral-7b-chat");
        assert_eq!(
            c.reasons_summary(),
            "Same model family (mistral), Shared variant: 7b, Token overlap (2/3)"
        );
        // 0.5 + 0.2 + 2/3 * 0.3
        assert!((c.score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn unrelated_models_score_zero() {
        let c = score("gpt-4", "llama-3.2-3b-instruct");
        assert_eq!(c.score, 0.0);
        assert!(c.matched_reasons.is_empty());
    }
}
