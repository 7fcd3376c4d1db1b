use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::issue::{ExpectedIssue, PredictedIssue};

/// Matching parameters. All are deployment-tunable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Minimum similarity for a predicted/expected pair to count as a match
    pub acceptance_threshold: f64,
    /// Weight of title/description word overlap
    pub text_weight: f64,
    /// Weight of location agreement
    pub location_weight: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.5,
            text_weight: 0.6,
            location_weight: 0.4,
        }
    }
}

/// One resolved predicted/expected pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedPair {
    pub predicted: PredictedIssue,
    pub expected: ExpectedIssue,
    pub similarity: f64,
    /// Whether predicted severity equals expected severity. A mismatch is
    /// charged to severity accuracy, never to precision/recall.
    pub severity_match: bool,
}

/// Exhaustive partition of both issue sets for one example.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchResult {
    pub pairs: Vec<MatchedPair>,
    /// Predicted issues with no expected counterpart
    pub false_positives: Vec<PredictedIssue>,
    /// Expected issues the model missed
    pub false_negatives: Vec<ExpectedIssue>,
}

impl MatchResult {
    pub fn matched_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn predicted_count(&self) -> usize {
        self.pairs.len() + self.false_positives.len()
    }

    pub fn expected_count(&self) -> usize {
        self.pairs.len() + self.false_negatives.len()
    }
}

/// Align predicted issues against expected issues for one example.
///
/// Greedy global assignment: among all unmatched pairs above the acceptance
/// threshold, fix the highest-similarity pair first and repeat. Ties prefer
/// the higher-severity expected issue, so critical findings are not starved
/// by coincidental equal-similarity matches; remaining ties fall back to
/// input order for determinism.
pub fn match_issues(
    predicted: &[PredictedIssue],
    expected: &[ExpectedIssue],
    config: &MatcherConfig,
) -> MatchResult {
    // All candidate pairings above threshold, then one global sort instead of
    // repeated max-scans.
    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for (ei, exp) in expected.iter().enumerate() {
        for (pi, pred) in predicted.iter().enumerate() {
            let sim = issue_similarity(pred, exp, config);
            if sim >= config.acceptance_threshold {
                candidates.push((sim, ei, pi));
            }
        }
    }

    candidates.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| expected[b.1].severity.cmp(&expected[a.1].severity))
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    });

    let mut used_expected: HashSet<usize> = HashSet::new();
    let mut used_predicted: HashSet<usize> = HashSet::new();
    let mut pairs = Vec::new();

    for (sim, ei, pi) in candidates {
        if used_expected.contains(&ei) || used_predicted.contains(&pi) {
            continue;
        }
        used_expected.insert(ei);
        used_predicted.insert(pi);

        let exp = &expected[ei];
        let pred = &predicted[pi];
        pairs.push(MatchedPair {
            severity_match: pred.severity == Some(exp.severity),
            predicted: pred.clone(),
            expected: exp.clone(),
            similarity: sim,
        });
    }

    // Keep expected order in the pair list so downstream output is stable.
    pairs.sort_by_key(|p| {
        expected
            .iter()
            .position(|e| *e == p.expected)
            .unwrap_or(usize::MAX)
    });

    let false_positives = predicted
        .iter()
        .enumerate()
        .filter(|(pi, _)| !used_predicted.contains(pi))
        .map(|(_, p)| p.clone())
        .collect();

    let false_negatives = expected
        .iter()
        .enumerate()
        .filter(|(ei, _)| !used_expected.contains(ei))
        .map(|(_, e)| e.clone())
        .collect();

    let result = MatchResult {
        pairs,
        false_positives,
        false_negatives,
    };

    debug!(
        matched = result.matched_count(),
        false_positives = result.false_positives.len(),
        false_negatives = result.false_negatives.len(),
        "Matched issues"
    );

    result
}

/// Similarity in [0,1] between a predicted and an expected issue.
///
/// Word-overlap Jaccard on title+description, plus location agreement. When
/// either side carries no location hints the text score takes full weight, so
/// an unlocated but well-titled prediction can still clear the threshold.
pub fn issue_similarity(pred: &PredictedIssue, exp: &ExpectedIssue, config: &MatcherConfig) -> f64 {
    // Title-on-title overlap, with the full text as a fallback signal: a
    // prediction whose title is poor may still overlap via its description,
    // but a clean title match must not be diluted by verbose prose.
    let title = jaccard(&word_set(&pred.title), &word_set(&exp.title));
    let full = jaccard(
        &word_set(&format!("{} {}", pred.title, pred.description)),
        &word_set(&format!("{} {}", exp.title, exp.fix)),
    );
    let text = title.max(full);

    let location = if pred.locations.is_empty() || exp.locations.is_empty() {
        None
    } else {
        let hit = pred
            .locations
            .iter()
            .any(|p| exp.locations.iter().any(|e| location_matches(p, e)));
        Some(if hit { 1.0 } else { 0.0 })
    };

    let score = match location {
        Some(loc) => config.text_weight * text + config.location_weight * loc,
        None => text,
    };
    score.clamp(0.0, 1.0)
}

/// Exact or prefix agreement: `authenticate_user` matches
/// `authenticate_user:12`, and vice versa.
fn location_matches(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.starts_with(b) || b.starts_with(a)
}

fn word_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let overlap = a.intersection(b).count();
    let union = a.union(b).count();
    overlap as f64 / union as f64
}
