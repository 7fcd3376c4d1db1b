use serde::{Deserialize, Serialize};

use skillforge_review::ExpectedIssue;

/// One review exercise: input code plus its ground-truth findings.
///
/// The unit of both training and evaluation. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    pub id: String,
    /// Language tag, e.g. `python`
    pub language: String,
    /// The source code under review
    pub code: String,
    /// Ordered ground-truth findings; (title, severity) unique per example
    pub expected_issues: Vec<ExpectedIssue>,
}

impl TrainingExample {
    /// A clean-code example expects no findings.
    pub fn is_clean(&self) -> bool {
        self.expected_issues.is_empty()
    }
}

/// An ordered, read-only set of examples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corpus {
    examples: Vec<TrainingExample>,
}

impl Corpus {
    pub fn new(examples: Vec<TrainingExample>) -> Self {
        Self { examples }
    }

    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrainingExample> {
        self.examples.iter()
    }
}
