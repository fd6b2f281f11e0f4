//! Evaluation of a generated reply against the keys the caller wanted answered.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Score reported when there were no expected keys to satisfy.
pub const EMPTY_KEY_SET_SCORE: f64 = 1.0;

/// How well an answer set covers the effective expected-key set.
///
/// `matched` and `missing` partition the effective keys, both in key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub score: f64,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
}

impl EvaluationResult {
    /// Whether every expected key was answered.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Evaluate `answers` against `expected_keys`.
///
/// A key is matched when its answer holds non-whitespace text. Duplicate
/// expected keys count once. Pure and deterministic.
pub fn evaluate(answers: &BTreeMap<String, String>, expected_keys: &[String]) -> EvaluationResult {
    let mut seen = HashSet::new();
    let mut matched = Vec::new();
    let mut missing = Vec::new();

    for key in expected_keys {
        if !seen.insert(key.as_str()) {
            continue;
        }
        let answered = answers
            .get(key)
            .is_some_and(|value| !value.trim().is_empty());
        if answered {
            matched.push(key.clone());
        } else {
            missing.push(key.clone());
        }
    }

    let score = score(matched.len(), missing.len());
    EvaluationResult {
        score,
        matched,
        missing,
    }
}

/// Fraction of expected keys that were matched, in `[0, 1]`.
pub fn score(matched: usize, missing: usize) -> f64 {
    let total = matched + missing;
    if total == 0 {
        return EMPTY_KEY_SET_SCORE;
    }
    matched as f64 / total as f64
}
