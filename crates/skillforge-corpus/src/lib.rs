//! # skillforge-corpus
//!
//! Loading and validation of review-exercise corpora.
//!
//! A corpus is a JSON document of cases, each carrying input code (inline or
//! as a relative file reference), a language tag, and the ground-truth
//! expected issues. Corpora are loaded once per run and treated as read-only
//! afterwards, so concurrent runs over the same corpus need no locking.

mod loader;
mod types;

pub use loader::load_corpus;
pub use types::{Corpus, TrainingExample};
