//! # skillforge-review
//!
//! The pure evaluation pipeline for code-review skill outputs.
//!
//! This crate turns raw model text into comparable findings and scores:
//!
//! - [`extract_issues`] - parse free-form review text into [`PredictedIssue`]s
//! - [`match_issues`] - align predictions against ground-truth [`ExpectedIssue`]s
//! - [`score_match`] - compute a [`QualityScore`] from a [`MatchResult`]
//!
//! Everything here is a total function: malformed text degrades to partial
//! extractions, and empty predicted/expected sets score to defined limits
//! rather than erroring.

mod extract;
mod issue;
mod matcher;
mod score;

pub use extract::{extract_issues, Extraction, ExtractionFidelity};
pub use issue::{ExpectedIssue, PredictedIssue, Severity, UNKNOWN_FIELD};
pub use matcher::{issue_similarity, match_issues, MatchResult, MatchedPair, MatcherConfig};
pub use score::{score_match, QualityScore, ScoreWeights, WeightsError};
