use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use skillforge_corpus::{Corpus, TrainingExample};
use skillforge_logging::{Logger, RunEvent};
use skillforge_model::ReviewModule;
use skillforge_review::QualityScore;

use crate::config::RunConfig;
use crate::error::ConfigError;
use crate::prompt::SkillPrompts;
use crate::runner::{evaluate_examples, ExampleResult};

/// How a demonstration earned its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemoKind {
    /// Model output that cleared the score threshold
    Bootstrapped,
    /// Ground-truth fallback used to fill a shortfall
    Labeled,
}

impl std::fmt::Display for DemoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DemoKind::Bootstrapped => write!(f, "bootstrapped"),
            DemoKind::Labeled => write!(f, "labeled"),
        }
    }
}

/// One few-shot demonstration: an example plus the output that demonstrated
/// it, with the score that earned selection (None for labeled fallbacks).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demonstration {
    pub example: TrainingExample,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<QualityScore>,
    pub kind: DemoKind,
}

/// Ordered, size-bounded demonstration set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemonstrationSet {
    pub created_at: DateTime<Utc>,
    pub demos: Vec<Demonstration>,
}

impl DemonstrationSet {
    pub fn len(&self) -> usize {
        self.demos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demos.is_empty()
    }

    pub fn bootstrapped_count(&self) -> usize {
        self.demos
            .iter()
            .filter(|d| d.kind == DemoKind::Bootstrapped)
            .count()
    }

    pub fn labeled_count(&self) -> usize {
        self.demos
            .iter()
            .filter(|d| d.kind == DemoKind::Labeled)
            .count()
    }
}

/// Selects few-shot demonstrations by running a candidate module over a
/// training corpus and keeping the outputs that score well.
///
/// Deterministic for a fixed module, trainset, and configuration: candidates
/// are ranked by descending overall score with trainset order breaking ties,
/// and the labeled fallback fills in trainset order.
pub struct Bootstrapper {
    module: Arc<dyn ReviewModule>,
    config: RunConfig,
    logger: Arc<Logger>,
}

impl Bootstrapper {
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

    /// Run the module over the trainset and assemble the demonstration set.
    ///
    /// Failed invocations are skipped - they leave the candidate pool, never
    /// abort the run. The result never exceeds
    /// `max_bootstrapped_demos + max_labeled_demos` demonstrations.
    pub async fn bootstrap(&self, prompt: &str, trainset: &Corpus) -> DemonstrationSet {
        self.logger.log(&RunEvent::BootstrapStarted {
            examples: trainset.len(),
            max_bootstrapped: self.config.max_bootstrapped_demos,
            max_labeled: self.config.max_labeled_demos,
        });

        let results = evaluate_examples(
            &self.module,
            prompt,
            trainset.examples(),
            &self.config,
            &self.logger,
        )
        .await;

        let selected = select_bootstrapped(
            &results,
            self.config.demo_threshold,
            self.config.max_bootstrapped_demos,
        );

        let mut demos = Vec::new();
        let mut used: HashSet<usize> = HashSet::new();

        for &index in &selected {
            let result = &results[index];
            let example = trainset.examples()[index].clone();
            let output = result
                .model_text
                .clone()
                .unwrap_or_else(|| SkillPrompts::render_expected_issues(&example.expected_issues));

            self.logger.log(&RunEvent::DemonstrationSelected {
                example_id: example.id.clone(),
                kind: DemoKind::Bootstrapped.to_string(),
                overall: Some(result.score.overall),
            });

            used.insert(index);
            demos.push(Demonstration {
                example,
                output,
                score: Some(result.score),
                kind: DemoKind::Bootstrapped,
            });
        }

        // Shortfall: back-fill with raw ground truth, in trainset order.
        if demos.len() < self.config.max_bootstrapped_demos {
            let mut labeled = 0;
            for (index, example) in trainset.iter().enumerate() {
                if labeled >= self.config.max_labeled_demos {
                    break;
                }
                if used.contains(&index) {
                    continue;
                }

                self.logger.log(&RunEvent::DemonstrationSelected {
                    example_id: example.id.clone(),
                    kind: DemoKind::Labeled.to_string(),
                    overall: None,
                });

                demos.push(Demonstration {
                    example: example.clone(),
                    output: SkillPrompts::render_expected_issues(&example.expected_issues),
                    score: None,
                    kind: DemoKind::Labeled,
                });
                labeled += 1;
            }
        }

        let set = DemonstrationSet {
            created_at: Utc::now(),
            demos,
        };

        info!(
            bootstrapped = set.bootstrapped_count(),
            labeled = set.labeled_count(),
            "Bootstrap complete"
        );
        self.logger.log(&RunEvent::BootstrapCompleted {
            bootstrapped: set.bootstrapped_count(),
            labeled: set.labeled_count(),
        });

        set
    }
}

/// Rank candidates by descending overall score, ties broken by trainset
/// order, and keep the top `max_demos`. Failed examples never qualify.
fn select_bootstrapped(results: &[ExampleResult], threshold: f64, max_demos: usize) -> Vec<usize> {
    let mut candidates: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.is_failed() && r.score.overall >= threshold)
        .map(|(i, _)| i)
        .collect();

    candidates.sort_by(|&a, &b| {
        results[b]
            .score
            .overall
            .total_cmp(&results[a].score.overall)
            .then_with(|| a.cmp(&b))
    });
    candidates.truncate(max_demos);
    candidates
}
