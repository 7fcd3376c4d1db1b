use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use skillforge_review::{ExpectedIssue, Severity};

use crate::types::{Corpus, TrainingExample};

/// On-disk corpus document.
#[derive(Debug, Deserialize)]
struct CorpusFile {
    cases: Vec<CaseRecord>,
}

#[derive(Debug, Deserialize)]
struct CaseRecord {
    id: String,
    language: String,
    /// Inline source code
    #[serde(default)]
    code: Option<String>,
    /// Alternative: path to a code file, relative to the corpus document
    #[serde(default)]
    code_file: Option<String>,
    #[serde(default)]
    expected_issues: Vec<IssueRecord>,
}

#[derive(Debug, Deserialize)]
struct IssueRecord {
    title: String,
    severity: String,
    locations: Vec<String>,
    fix: String,
}

/// Load and validate a corpus document.
///
/// Structural violations are load-time errors, never silently repaired:
/// empty ids/languages, cases with neither `code` nor `code_file`, issues
/// without locations, unknown severities, and duplicate (title, severity)
/// pairs within one case all fail the load.
pub fn load_corpus(path: &Path) -> Result<Corpus> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;

    let file: CorpusFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse corpus file: {}", path.display()))?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut examples = Vec::with_capacity(file.cases.len());
    let mut seen_ids: HashSet<String> = HashSet::new();

    for case in file.cases {
        if case.id.trim().is_empty() {
            bail!("Corpus case with empty id");
        }
        if !seen_ids.insert(case.id.clone()) {
            bail!("Duplicate case id `{}` in corpus", case.id);
        }
        if case.language.trim().is_empty() {
            bail!("Case `{}` has an empty language tag", case.id);
        }

        let code = match (case.code, case.code_file) {
            (Some(code), None) => code,
            (None, Some(rel)) => {
                let code_path = base_dir.join(&rel);
                std::fs::read_to_string(&code_path).with_context(|| {
                    format!(
                        "Failed to read code file `{}` for case `{}`",
                        code_path.display(),
                        case.id
                    )
                })?
            }
            (Some(_), Some(_)) => {
                bail!("Case `{}` sets both `code` and `code_file`", case.id)
            }
            (None, None) => bail!("Case `{}` sets neither `code` nor `code_file`", case.id),
        };

        let mut expected_issues = Vec::with_capacity(case.expected_issues.len());
        let mut seen_pairs: HashSet<(String, Severity)> = HashSet::new();

        for issue in case.expected_issues {
            let severity: Severity = issue.severity.parse().map_err(|e: String| {
                anyhow::anyhow!("Case `{}`, issue `{}`: {}", case.id, issue.title, e)
            })?;

            if issue.locations.is_empty() {
                bail!(
                    "Case `{}`, issue `{}`: expected issues need at least one location",
                    case.id,
                    issue.title
                );
            }
            if !seen_pairs.insert((issue.title.to_lowercase(), severity)) {
                bail!(
                    "Case `{}`: duplicate expected issue `{}` ({})",
                    case.id,
                    issue.title,
                    severity
                );
            }

            expected_issues.push(ExpectedIssue {
                title: issue.title,
                severity,
                locations: issue.locations,
                fix: issue.fix,
            });
        }

        examples.push(TrainingExample {
            id: case.id,
            language: case.language,
            code,
            expected_issues,
        });
    }

    info!(
        path = %path.display(),
        examples = examples.len(),
        "Loaded corpus"
    );

    Ok(Corpus::new(examples))
}
