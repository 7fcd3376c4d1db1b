use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::issue::Severity;
use crate::matcher::MatchResult;

/// Weights for the overall composite score. Normalized by their sum, so any
/// non-negative, non-zero combination is valid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weight of the detection term (F1, or precision when F1 is undefined)
    pub detection: f64,
    pub critical_recall: f64,
    pub fix_quality: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            detection: 0.4,
            critical_recall: 0.3,
            fix_quality: 0.3,
        }
    }
}

#[derive(Error, Debug)]
pub enum WeightsError {
    #[error("score weight `{0}` is negative")]
    Negative(&'static str),

    #[error("score weights sum to zero")]
    ZeroSum,
}

impl ScoreWeights {
    /// Reject invalid weights up front; they are never silently clamped.
    pub fn validate(&self) -> Result<(), WeightsError> {
        for (name, value) in [
            ("detection", self.detection),
            ("critical_recall", self.critical_recall),
            ("fix_quality", self.fix_quality),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(WeightsError::Negative(name));
            }
        }
        if self.sum() == 0.0 {
            return Err(WeightsError::ZeroSum);
        }
        Ok(())
    }

    fn sum(&self) -> f64 {
        self.detection + self.critical_recall + self.fix_quality
    }
}

/// Composite quality of one (example, model output) pair. Every component is
/// in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub precision: f64,
    /// None for a clean-code example where the model predicted issues anyway:
    /// recall is undefined there and excluded from aggregation.
    pub recall: Option<f64>,
    /// Harmonic mean of precision and recall; inherits recall's optionality.
    pub f1: Option<f64>,
    pub critical_recall: f64,
    pub severity_accuracy: f64,
    pub fix_quality: f64,
    pub overall: f64,
}

impl QualityScore {
    /// The zero-valued score recorded for failed evaluations.
    pub fn zeroed() -> Self {
        Self {
            precision: 0.0,
            recall: Some(0.0),
            f1: Some(0.0),
            critical_recall: 0.0,
            severity_accuracy: 0.0,
            fix_quality: 0.0,
            overall: 0.0,
        }
    }
}

/// Compute a [`QualityScore`] from a match result.
///
/// Total for all inputs; empty predicted/expected sets hit the defined
/// limits instead of erroring:
/// - zero predictions means perfect precision (nothing falsely reported),
/// - zero expected issues means recall 1.0 if the model also stayed silent,
///   undefined otherwise,
/// - zero critical expected issues means critical recall 1.0.
pub fn score_match(result: &MatchResult, weights: &ScoreWeights) -> QualityScore {
    let matched = result.matched_count();
    let predicted = result.predicted_count();
    let expected = result.expected_count();

    let precision = if predicted == 0 {
        1.0
    } else {
        matched as f64 / predicted as f64
    };

    let recall = if expected == 0 {
        if predicted == 0 {
            Some(1.0)
        } else {
            None
        }
    } else {
        Some(matched as f64 / expected as f64)
    };

    let f1 = recall.map(|r| {
        if precision + r == 0.0 {
            0.0
        } else {
            2.0 * precision * r / (precision + r)
        }
    });

    let critical_expected = result
        .pairs
        .iter()
        .map(|p| &p.expected)
        .chain(result.false_negatives.iter())
        .filter(|e| e.severity == Severity::Critical)
        .count();
    let critical_matched = result
        .pairs
        .iter()
        .filter(|p| p.expected.severity == Severity::Critical)
        .count();
    let critical_recall = if critical_expected == 0 {
        1.0
    } else {
        critical_matched as f64 / critical_expected as f64
    };

    let severity_accuracy =
        result.pairs.iter().filter(|p| p.severity_match).count() as f64 / matched.max(1) as f64;

    let fix_quality = result
        .pairs
        .iter()
        .filter(|p| p.predicted.has_fix() && p.predicted.explains_impact())
        .count() as f64
        / matched.max(1) as f64;

    let detection = f1.unwrap_or(precision);
    let overall = (weights.detection * detection
        + weights.critical_recall * critical_recall
        + weights.fix_quality * fix_quality)
        / weights.sum();

    QualityScore {
        precision,
        recall,
        f1,
        critical_recall,
        severity_accuracy,
        fix_quality,
        overall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{ExpectedIssue, PredictedIssue};
    use crate::matcher::{match_issues, MatcherConfig};

    fn run(predicted: &[PredictedIssue], expected: &[ExpectedIssue]) -> QualityScore {
        let result = match_issues(predicted, expected, &MatcherConfig::default());
        score_match(&result, &ScoreWeights::default())
    }

    fn sqli_predicted() -> PredictedIssue {
        PredictedIssue {
            title: "SQLi".into(),
            severity: Some(Severity::Critical),
            locations: vec!["f:10".into()],
            description: "allows an attacker to dump the users table".into(),
            fix: Some("use bound parameters".into()),
        }
    }

    fn sqli_expected() -> ExpectedIssue {
        ExpectedIssue {
            title: "SQLi".into(),
            severity: Severity::Critical,
            locations: vec!["f:10".into()],
            fix: "use bound parameters".into(),
        }
    }

    #[test]
    fn test_clean_code_correctly_reported() {
        let score = run(&[], &[]);
        assert_eq!(score.precision, 1.0);
        assert_eq!(score.recall, Some(1.0));
        assert_eq!(score.critical_recall, 1.0);
    }

    #[test]
    fn test_exact_critical_match() {
        let score = run(&[sqli_predicted()], &[sqli_expected()]);
        assert_eq!(score.precision, 1.0);
        assert_eq!(score.recall, Some(1.0));
        assert_eq!(score.f1, Some(1.0));
        assert_eq!(score.critical_recall, 1.0);
        assert_eq!(score.severity_accuracy, 1.0);
        assert_eq!(score.fix_quality, 1.0);
        assert_eq!(score.overall, 1.0);
    }

    #[test]
    fn test_missed_critical_issue() {
        let score = run(&[], &[sqli_expected()]);
        // Vacuously perfect precision, zero recall.
        assert_eq!(score.precision, 1.0);
        assert_eq!(score.recall, Some(0.0));
        assert_eq!(score.f1, Some(0.0));
        assert_eq!(score.critical_recall, 0.0);
    }

    #[test]
    fn test_false_positive_on_clean_code() {
        let score = run(&[sqli_predicted()], &[]);
        assert_eq!(score.precision, 0.0);
        // Recall is undefined on clean code with predictions; excluded.
        assert_eq!(score.recall, None);
        assert_eq!(score.f1, None);
        assert_eq!(score.critical_recall, 1.0);
        // Detection falls back to precision, so the false positive still
        // costs overall score.
        assert!(score.overall < 1.0);
    }

    #[test]
    fn test_critical_recall_ignores_non_critical() {
        let expected = vec![ExpectedIssue {
            title: "Magic number".into(),
            severity: Severity::Low,
            locations: vec!["g:4".into()],
            fix: "name the constant".into(),
        }];
        let score = run(&[], &expected);
        assert_eq!(score.critical_recall, 1.0);
        assert_eq!(score.recall, Some(0.0));
    }

    #[test]
    fn test_severity_mismatch_only_hits_severity_accuracy() {
        let mut pred = sqli_predicted();
        pred.severity = Some(Severity::Medium);
        let score = run(&[pred], &[sqli_expected()]);
        assert_eq!(score.precision, 1.0);
        assert_eq!(score.recall, Some(1.0));
        assert_eq!(score.severity_accuracy, 0.0);
        assert_eq!(score.critical_recall, 1.0);
    }

    #[test]
    fn test_fix_quality_requires_fix_and_impact() {
        let mut no_impact = sqli_predicted();
        no_impact.description = "bad query construction".into();
        let score = run(&[no_impact], &[sqli_expected()]);
        assert_eq!(score.fix_quality, 0.0);

        let mut no_fix = sqli_predicted();
        no_fix.fix = None;
        let score = run(&[no_fix], &[sqli_expected()]);
        assert_eq!(score.fix_quality, 0.0);
    }

    #[test]
    fn test_all_components_in_unit_interval() {
        let predicted = vec![
            sqli_predicted(),
            PredictedIssue {
                title: "Spurious style nit".into(),
                severity: None,
                locations: vec![],
                description: String::new(),
                fix: None,
            },
        ];
        let expected = vec![
            sqli_expected(),
            ExpectedIssue {
                title: "Unvalidated redirect".into(),
                severity: Severity::High,
                locations: vec!["redirect:7".into()],
                fix: "whitelist target hosts".into(),
            },
        ];
        let score = run(&predicted, &expected);
        for value in [
            score.precision,
            score.recall.unwrap_or(0.0),
            score.f1.unwrap_or(0.0),
            score.critical_recall,
            score.severity_accuracy,
            score.fix_quality,
            score.overall,
        ] {
            assert!((0.0..=1.0).contains(&value), "out of range: {}", value);
        }
    }

    #[test]
    fn test_weights_validation() {
        assert!(ScoreWeights::default().validate().is_ok());

        let negative = ScoreWeights {
            detection: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(WeightsError::Negative("detection"))
        ));

        let zero = ScoreWeights {
            detection: 0.0,
            critical_recall: 0.0,
            fix_quality: 0.0,
        };
        assert!(matches!(zero.validate(), Err(WeightsError::ZeroSum)));
    }
}
