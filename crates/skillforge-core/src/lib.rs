//! # skillforge-core
//!
//! Orchestration for skill evaluation and few-shot optimization.
//!
//! ## Key Types
//!
//! - [`EvaluationRunner`] - score a skill prompt over a validation corpus
//! - [`Bootstrapper`] - select few-shot demonstrations from a training corpus
//! - [`compare_runs`] - diff two evaluation runs into a [`ComparisonReport`]
//! - [`RunConfig`] - the numeric configuration surface, validated up front
//!
//! Runs are immutable values: each [`EvaluationRun`] and [`DemonstrationSet`]
//! is produced by a pure function of (module, corpus, configuration) and is
//! never mutated in place.

mod bootstrap;
mod compare;
mod config;
mod error;
mod prompt;
mod runner;

pub use bootstrap::{Bootstrapper, DemoKind, Demonstration, DemonstrationSet};
pub use compare::{compare_runs, ComparisonReport, MetricDelta, Verdict};
pub use config::RunConfig;
pub use error::{CompareError, ConfigError};
pub use prompt::SkillPrompts;
pub use runner::{
    AggregateMetrics, EvaluationRun, EvaluationRunner, ExampleResult, FailureKind, MetricSummary,
};
