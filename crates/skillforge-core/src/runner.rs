use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use skillforge_corpus::{Corpus, TrainingExample};
use skillforge_logging::{Logger, RunEvent};
use skillforge_model::{InvocationError, ModelOutput, ReviewModule};
use skillforge_review::{extract_issues, match_issues, score_match, QualityScore};

use crate::config::RunConfig;
use crate::error::ConfigError;

/// Why an example produced no score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Model invocation failed after all retries
    Invocation { error: String },
    /// Invocation (or the whole run) hit its deadline
    Timeout,
}

/// Per-example outcome. Recorded even on failure, so failure rate is itself
/// an auditable metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleResult {
    pub index: usize,
    pub example_id: String,
    pub score: QualityScore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Raw model text, kept so bootstrapping can reuse it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_text: Option<String>,
    pub duration_secs: f64,
}

impl ExampleResult {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    fn failed(index: usize, example_id: String, failure: FailureKind) -> Self {
        Self {
            index,
            example_id,
            score: QualityScore::zeroed(),
            failure: Some(failure),
            model_text: None,
            duration_secs: 0.0,
        }
    }
}

/// Mean and population variance of one metric over successful examples.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub variance: f64,
    /// How many examples contributed (recall/F1 exclude undefined cases)
    pub samples: usize,
}

impl MetricSummary {
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            variance,
            samples: values.len(),
        }
    }
}

/// Aggregate statistics over a validation set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub precision: MetricSummary,
    pub recall: MetricSummary,
    pub f1: MetricSummary,
    pub critical_recall: MetricSummary,
    pub severity_accuracy: MetricSummary,
    pub fix_quality: MetricSummary,
    pub overall: MetricSummary,
}

/// One immutable evaluation of a skill prompt over a corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub id: String,
    pub skill_label: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub results: Vec<ExampleResult>,
    pub aggregate: AggregateMetrics,
    /// Fraction of examples that failed to evaluate; metrics above cover
    /// only the remainder
    pub failure_rate: f64,
}

impl EvaluationRun {
    pub fn example_ids(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.example_id.as_str())
    }
}

/// Scores a (skill prompt, module) pair over a validation corpus.
pub struct EvaluationRunner {
    module: Arc<dyn ReviewModule>,
    config: RunConfig,
    logger: Arc<Logger>,
}

impl EvaluationRunner {
    /// Configuration is validated here, before any model call.
    pub fn new(
        module: Arc<dyn ReviewModule>,
        config: RunConfig,
        logger: Arc<Logger>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            module,
            config,
            logger,
        })
    }

    /// Evaluate every example and aggregate. Individual failures never abort
    /// the run; they are zero-scored, flagged, and counted in failure_rate.
    pub async fn run(&self, skill_label: &str, prompt: &str, corpus: &Corpus) -> EvaluationRun {
        let id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        self.logger.log(&RunEvent::RunStarted {
            run_id: id.clone(),
            skill: skill_label.to_string(),
            examples: corpus.len(),
            concurrency: self.config.concurrency,
        });

        let results =
            evaluate_examples(&self.module, prompt, corpus.examples(), &self.config, &self.logger)
                .await;

        let (aggregate, failure_rate) = aggregate_results(&results);
        let duration_secs = start.elapsed().as_secs_f64();

        self.logger.log(&RunEvent::RunCompleted {
            run_id: id.clone(),
            mean_overall: aggregate.overall.mean,
            failure_rate,
            duration_secs,
        });

        EvaluationRun {
            id,
            skill_label: skill_label.to_string(),
            started_at,
            duration_secs,
            results,
            aggregate,
            failure_rate,
        }
    }
}

/// Fan out invoke → extract → match → score over independent examples.
///
/// Results land in per-index slots, so the only shared state is the final
/// collection pass after all tasks (or the run deadline) resolve. Retries
/// happen inside a task while it holds its concurrency permit, so a retried
/// call never counts twice toward the limit.
pub(crate) async fn evaluate_examples(
    module: &Arc<dyn ReviewModule>,
    prompt: &str,
    examples: &[TrainingExample],
    config: &RunConfig,
    logger: &Logger,
) -> Vec<ExampleResult> {
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let prompt: Arc<str> = Arc::from(prompt);
    let mut join_set: JoinSet<(usize, ExampleResult)> = JoinSet::new();

    for (index, example) in examples.iter().enumerate() {
        let module = Arc::clone(module);
        let semaphore = Arc::clone(&semaphore);
        let prompt = Arc::clone(&prompt);
        let config = config.clone();
        let example = example.clone();

        join_set.spawn(async move {
            // Closed only when the JoinSet is aborted; the task ends with it.
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        index,
                        ExampleResult::failed(index, example.id.clone(), FailureKind::Timeout),
                    )
                }
            };
            let result = evaluate_one(&*module, &prompt, &example, index, &config).await;
            (index, result)
        });
    }

    let mut slots: Vec<Option<ExampleResult>> = (0..examples.len()).map(|_| None).collect();

    let drain = async {
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    log_example(logger, &result);
                    slots[index] = Some(result);
                }
                Err(e) => warn!(error = %e, "Evaluation task panicked"),
            }
        }
    };

    match config.run_timeout() {
        Some(deadline) => {
            if tokio::time::timeout(deadline, drain).await.is_err() {
                warn!(?deadline, "Run deadline reached, aborting in-flight evaluations");
                join_set.abort_all();
            }
        }
        None => drain.await,
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                let result = ExampleResult::failed(
                    index,
                    examples[index].id.clone(),
                    FailureKind::Timeout,
                );
                log_example(logger, &result);
                result
            })
        })
        .collect()
}

/// Invoke with bounded retry, then extract, match, and score.
async fn evaluate_one(
    module: &dyn ReviewModule,
    prompt: &str,
    example: &TrainingExample,
    index: usize,
    config: &RunConfig,
) -> ExampleResult {
    let start = Instant::now();

    let output = match invoke_with_retry(module, prompt, example, config).await {
        Ok(output) => output,
        Err(e) => {
            let failure = if e.is_timeout() {
                FailureKind::Timeout
            } else {
                FailureKind::Invocation {
                    error: e.to_string(),
                }
            };
            return ExampleResult::failed(index, example.id.clone(), failure);
        }
    };

    let extraction = extract_issues(&output.text);
    let matched = match_issues(&extraction.issues, &example.expected_issues, &config.matcher);
    let score = score_match(&matched, &config.weights);

    debug!(
        example = %example.id,
        predicted = matched.predicted_count(),
        expected = matched.expected_count(),
        overall = score.overall,
        "Scored example"
    );

    ExampleResult {
        index,
        example_id: example.id.clone(),
        score,
        failure: None,
        model_text: Some(output.text),
        duration_secs: start.elapsed().as_secs_f64(),
    }
}

async fn invoke_with_retry(
    module: &dyn ReviewModule,
    prompt: &str,
    example: &TrainingExample,
    config: &RunConfig,
) -> Result<ModelOutput, InvocationError> {
    let mut attempt = 0;
    loop {
        let call = module.review(prompt, &example.code, &example.language);
        let outcome = match tokio::time::timeout(config.invoke_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(InvocationError::Timeout(config.invoke_timeout())),
        };

        match outcome {
            Ok(output) => return Ok(output),
            Err(e) if attempt < config.max_retries => {
                attempt += 1;
                warn!(
                    example = %example.id,
                    attempt,
                    error = %e,
                    "Invocation failed, retrying"
                );
                tokio::time::sleep(config.retry_backoff(attempt)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn log_example(logger: &Logger, result: &ExampleResult) {
    match &result.failure {
        None => logger.log(&RunEvent::ExampleEvaluated {
            index: result.index,
            example_id: result.example_id.clone(),
            overall: result.score.overall,
            duration_secs: result.duration_secs,
        }),
        Some(failure) => logger.log(&RunEvent::ExampleFailed {
            index: result.index,
            example_id: result.example_id.clone(),
            error: match failure {
                FailureKind::Invocation { error } => error.clone(),
                FailureKind::Timeout => "timed out".to_string(),
            },
            timed_out: matches!(failure, FailureKind::Timeout),
        }),
    }
}

/// One pass over the finished results; no counters are shared with the
/// evaluation tasks.
pub(crate) fn aggregate_results(results: &[ExampleResult]) -> (AggregateMetrics, f64) {
    let succeeded: Vec<&ExampleResult> = results.iter().filter(|r| !r.is_failed()).collect();

    let failure_rate = if results.is_empty() {
        0.0
    } else {
        (results.len() - succeeded.len()) as f64 / results.len() as f64
    };

    let collect = |f: &dyn Fn(&QualityScore) -> Option<f64>| -> Vec<f64> {
        succeeded.iter().filter_map(|r| f(&r.score)).collect()
    };

    let aggregate = AggregateMetrics {
        precision: MetricSummary::from_values(&collect(&|s| Some(s.precision))),
        recall: MetricSummary::from_values(&collect(&|s| s.recall)),
        f1: MetricSummary::from_values(&collect(&|s| s.f1)),
        critical_recall: MetricSummary::from_values(&collect(&|s| Some(s.critical_recall))),
        severity_accuracy: MetricSummary::from_values(&collect(&|s| Some(s.severity_accuracy))),
        fix_quality: MetricSummary::from_values(&collect(&|s| Some(s.fix_quality))),
        overall: MetricSummary::from_values(&collect(&|s| Some(s.overall))),
    };

    (aggregate, failure_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_overall(index: usize, overall: f64) -> ExampleResult {
        ExampleResult {
            index,
            example_id: format!("ex-{}", index),
            score: QualityScore {
                precision: overall,
                recall: Some(overall),
                f1: Some(overall),
                critical_recall: overall,
                severity_accuracy: overall,
                fix_quality: overall,
                overall,
            },
            failure: None,
            model_text: Some(String::new()),
            duration_secs: 0.1,
        }
    }

    #[test]
    fn test_aggregate_means_and_failure_rate() {
        let results = vec![
            result_with_overall(0, 0.8),
            result_with_overall(1, 0.4),
            ExampleResult::failed(2, "ex-2".into(), FailureKind::Timeout),
            ExampleResult::failed(
                3,
                "ex-3".into(),
                FailureKind::Invocation {
                    error: "boom".into(),
                },
            ),
        ];

        let (aggregate, failure_rate) = aggregate_results(&results);
        // Failed examples are excluded from the means but counted in the rate.
        assert!((aggregate.overall.mean - 0.6).abs() < 1e-9);
        assert_eq!(aggregate.overall.samples, 2);
        assert!((failure_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_excludes_undefined_recall() {
        let mut clean_with_fp = result_with_overall(0, 0.3);
        clean_with_fp.score.recall = None;
        clean_with_fp.score.f1 = None;
        let results = vec![clean_with_fp, result_with_overall(1, 1.0)];

        let (aggregate, _) = aggregate_results(&results);
        assert_eq!(aggregate.recall.samples, 1);
        assert!((aggregate.recall.mean - 1.0).abs() < 1e-9);
        assert_eq!(aggregate.precision.samples, 2);
    }

    #[test]
    fn test_aggregate_empty_results() {
        let (aggregate, failure_rate) = aggregate_results(&[]);
        assert_eq!(aggregate.overall.samples, 0);
        assert_eq!(failure_rate, 0.0);
    }

    #[test]
    fn test_variance() {
        let summary = MetricSummary::from_values(&[0.2, 0.4, 0.6]);
        assert!((summary.mean - 0.4).abs() < 1e-9);
        assert!((summary.variance - (0.04 + 0.0 + 0.04) / 3.0).abs() < 1e-9);
    }
}
