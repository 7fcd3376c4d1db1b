use serde::{Deserialize, Serialize};

use crate::error::CompareError;
use crate::runner::EvaluationRun;

/// Outcome of a baseline/candidate comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Improved,
    NoSignificantChange,
    Regressed,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Improved => write!(f, "improved"),
            Verdict::NoSignificantChange => write!(f, "no_significant_change"),
            Verdict::Regressed => write!(f, "regressed"),
        }
    }
}

/// Baseline vs candidate for one metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricDelta {
    pub baseline: f64,
    pub candidate: f64,
    pub delta: f64,
    /// Delta relative to the baseline; None when the baseline is zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative: Option<f64>,
}

impl MetricDelta {
    fn new(baseline: f64, candidate: f64) -> Self {
        let delta = candidate - baseline;
        let relative = if baseline == 0.0 {
            None
        } else {
            Some(delta / baseline)
        };
        Self {
            baseline,
            candidate,
            delta,
            relative,
        }
    }
}

/// Structured diff of two evaluation runs. An external formatter renders
/// this; the core never produces prose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub baseline_run: String,
    pub candidate_run: String,
    pub noise_threshold: f64,
    pub verdict: Verdict,
    pub precision: MetricDelta,
    pub recall: MetricDelta,
    pub f1: MetricDelta,
    pub critical_recall: MetricDelta,
    pub severity_accuracy: MetricDelta,
    pub fix_quality: MetricDelta,
    pub overall: MetricDelta,
    pub failure_rate: MetricDelta,
}

/// Diff two runs over the same validation set.
///
/// The verdict is gated by `noise_threshold`: the candidate must beat the
/// baseline's overall mean by strictly more than the threshold to count as
/// improved (and symmetrically for regressed), so run-to-run output variance
/// is not reported as change.
pub fn compare_runs(
    baseline: &EvaluationRun,
    candidate: &EvaluationRun,
    noise_threshold: f64,
) -> Result<ComparisonReport, CompareError> {
    if baseline.results.len() != candidate.results.len() {
        return Err(CompareError::SizeMismatch {
            baseline: baseline.results.len(),
            candidate: candidate.results.len(),
        });
    }
    for (index, (b, c)) in baseline
        .example_ids()
        .zip(candidate.example_ids())
        .enumerate()
    {
        if b != c {
            return Err(CompareError::ExampleMismatch {
                index,
                baseline: b.to_string(),
                candidate: c.to_string(),
            });
        }
    }

    let overall = MetricDelta::new(
        baseline.aggregate.overall.mean,
        candidate.aggregate.overall.mean,
    );

    let verdict = if overall.delta > noise_threshold {
        Verdict::Improved
    } else if overall.delta < -noise_threshold {
        Verdict::Regressed
    } else {
        Verdict::NoSignificantChange
    };

    Ok(ComparisonReport {
        baseline_run: baseline.id.clone(),
        candidate_run: candidate.id.clone(),
        noise_threshold,
        verdict,
        precision: MetricDelta::new(
            baseline.aggregate.precision.mean,
            candidate.aggregate.precision.mean,
        ),
        recall: MetricDelta::new(
            baseline.aggregate.recall.mean,
            candidate.aggregate.recall.mean,
        ),
        f1: MetricDelta::new(baseline.aggregate.f1.mean, candidate.aggregate.f1.mean),
        critical_recall: MetricDelta::new(
            baseline.aggregate.critical_recall.mean,
            candidate.aggregate.critical_recall.mean,
        ),
        severity_accuracy: MetricDelta::new(
            baseline.aggregate.severity_accuracy.mean,
            candidate.aggregate.severity_accuracy.mean,
        ),
        fix_quality: MetricDelta::new(
            baseline.aggregate.fix_quality.mean,
            candidate.aggregate.fix_quality.mean,
        ),
        overall,
        failure_rate: MetricDelta::new(baseline.failure_rate, candidate.failure_rate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{AggregateMetrics, ExampleResult, MetricSummary};
    use skillforge_review::QualityScore;

    fn run_with_overall(id: &str, example_ids: &[&str], mean_overall: f64) -> EvaluationRun {
        let results = example_ids
            .iter()
            .enumerate()
            .map(|(index, ex)| ExampleResult {
                index,
                example_id: ex.to_string(),
                score: QualityScore::zeroed(),
                failure: None,
                model_text: None,
                duration_secs: 0.0,
            })
            .collect();

        EvaluationRun {
            id: id.to_string(),
            skill_label: "skill".into(),
            started_at: chrono::Utc::now(),
            duration_secs: 1.0,
            results,
            aggregate: AggregateMetrics {
                overall: MetricSummary {
                    mean: mean_overall,
                    variance: 0.0,
                    samples: example_ids.len(),
                },
                ..Default::default()
            },
            failure_rate: 0.0,
        }
    }

    #[test]
    fn test_improvement_beyond_noise_threshold() {
        let baseline = run_with_overall("b", &["a", "b"], 0.60);
        let candidate = run_with_overall("c", &["a", "b"], 0.65);

        let report = compare_runs(&baseline, &candidate, 0.01).unwrap();
        assert_eq!(report.verdict, Verdict::Improved);
        assert!((report.overall.delta - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_small_delta_is_no_significant_change() {
        // +0.3 percentage points under a 1-point threshold: not improvement.
        let baseline = run_with_overall("b", &["a", "b"], 0.600);
        let candidate = run_with_overall("c", &["a", "b"], 0.603);

        let report = compare_runs(&baseline, &candidate, 0.01).unwrap();
        assert_eq!(report.verdict, Verdict::NoSignificantChange);
    }

    #[test]
    fn test_regression_beyond_noise_threshold() {
        let baseline = run_with_overall("b", &["a"], 0.60);
        let candidate = run_with_overall("c", &["a"], 0.50);

        let report = compare_runs(&baseline, &candidate, 0.01).unwrap();
        assert_eq!(report.verdict, Verdict::Regressed);
    }

    #[test]
    fn test_mismatched_validation_sets_rejected() {
        let baseline = run_with_overall("b", &["a", "b"], 0.6);
        let shorter = run_with_overall("c", &["a"], 0.6);
        assert!(matches!(
            compare_runs(&baseline, &shorter, 0.01),
            Err(CompareError::SizeMismatch { .. })
        ));

        let reordered = run_with_overall("c", &["b", "a"], 0.6);
        assert!(matches!(
            compare_runs(&baseline, &reordered, 0.01),
            Err(CompareError::ExampleMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn test_relative_delta_absent_for_zero_baseline() {
        let baseline = run_with_overall("b", &["a"], 0.0);
        let candidate = run_with_overall("c", &["a"], 0.4);
        let report = compare_runs(&baseline, &candidate, 0.01).unwrap();
        assert!(report.overall.relative.is_none());
        assert_eq!(report.verdict, Verdict::Improved);
    }
}
