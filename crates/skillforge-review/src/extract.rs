use tracing::debug;

use crate::issue::{PredictedIssue, Severity, UNKNOWN_FIELD};

/// How much structure the extractor recovered from the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionFidelity {
    /// Every issue carried a title and a severity
    FullyParsed,
    /// At least one issue has sentinel/missing fields
    PartiallyParsed,
    /// Non-empty text with nothing resembling an issue
    Unparseable,
}

/// Result of extracting issues from one block of model output.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub issues: Vec<PredictedIssue>,
    pub fidelity: ExtractionFidelity,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Parse free-form review output into an ordered sequence of issues.
///
/// Tolerated shapes: numbered lists, markdown bold-title headers,
/// `Issue:`/`Problem:` markers, severity keywords inline or as labels,
/// `Location:` hints and `name:line` tokens, code-fenced fix snippets.
///
/// Never fails. Text with no findings yields an empty `FullyParsed`
/// extraction - that is the signal the model found no problems. A fragment
/// that resembles an issue (severity keyword plus prose) but cannot be
/// structured yields a sentinel issue instead of being dropped.
pub fn extract_issues(text: &str) -> Extraction {
    let blocks = split_blocks(text);

    if blocks.is_empty() {
        return extract_fallback(text);
    }

    let issues: Vec<PredictedIssue> = blocks.iter().map(|b| parse_block(b)).collect();

    let complete = issues
        .iter()
        .all(|i| i.title != UNKNOWN_FIELD && i.severity.is_some());

    debug!(
        issues = issues.len(),
        complete, "Extracted issues from model output"
    );

    Extraction {
        issues,
        fidelity: if complete {
            ExtractionFidelity::FullyParsed
        } else {
            ExtractionFidelity::PartiallyParsed
        },
    }
}

/// Group lines into per-issue blocks, honoring code fences.
fn split_blocks(text: &str) -> Vec<Vec<String>> {
    let mut blocks: Vec<Vec<String>> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            if let Some(block) = blocks.last_mut() {
                block.push(line.to_string());
            }
            continue;
        }

        if in_fence {
            if let Some(block) = blocks.last_mut() {
                block.push(line.to_string());
            }
            continue;
        }

        if is_issue_start(line) {
            blocks.push(vec![line.to_string()]);
        } else if let Some(block) = blocks.last_mut() {
            block.push(line.to_string());
        }
        // Lines before the first issue marker are preamble; skip them.
    }

    blocks
}

fn is_issue_start(line: &str) -> bool {
    let trimmed = line.trim_start();

    if strip_numbered_marker(trimmed).is_some() {
        return true;
    }

    // **Bold title** header
    if let Some(rest) = trimmed.strip_prefix("**") {
        if rest.contains("**") {
            return true;
        }
    }

    // Issue: / Issue #3: / Problem: markers
    let lower = trimmed.to_lowercase();
    if (lower.starts_with("issue") || lower.starts_with("problem")) && trimmed.contains(':') {
        return true;
    }

    // Bullet carrying a severity tag, e.g. `- [High] ...` or `- Critical: ...`
    if let Some(rest) = strip_bullet_marker(trimmed) {
        if leading_severity_tag(rest).is_some() {
            return true;
        }
    }

    false
}

/// `1. ` / `2) ` list markers. Decimals like `1.5` are not markers.
fn strip_numbered_marker(s: &str) -> Option<&str> {
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &s[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    if rest.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(rest.trim_start())
}

fn strip_bold(s: &str) -> String {
    s.replace("**", "").trim().to_string()
}

fn strip_bullet_marker(s: &str) -> Option<&str> {
    s.strip_prefix("- ").or_else(|| s.strip_prefix("* "))
}

/// Severity tag at the start of a fragment: `[High]`, `(High)`, `**High**`,
/// or `High:`. Returns the severity and the remainder.
fn leading_severity_tag(s: &str) -> Option<(Severity, &str)> {
    let s = s.trim_start();

    for (open, close) in [("[", "]"), ("(", ")"), ("**", "**")] {
        if let Some(rest) = s.strip_prefix(open) {
            if let Some(end) = rest.find(close) {
                if let Ok(sev) = rest[..end].parse::<Severity>() {
                    return Some((sev, rest[end + close.len()..].trim_start()));
                }
            }
        }
    }

    if let Some((head, rest)) = s.split_once(':') {
        if let Ok(sev) = head.parse::<Severity>() {
            return Some((sev, rest.trim_start()));
        }
    }

    None
}

fn parse_block(lines: &[String]) -> PredictedIssue {
    let header = lines.first().map(String::as_str).unwrap_or_default();
    let (title, header_rest, header_severity) = parse_header(header);

    let mut severity = header_severity;
    let mut locations: Vec<String> = Vec::new();
    let mut fix: Option<String> = None;
    let mut description_parts: Vec<String> = Vec::new();

    scan_location_tokens(header, &mut locations);
    if !header_rest.is_empty() {
        description_parts.push(header_rest);
    }

    let mut in_fence = false;
    let mut fence_lines: Vec<String> = Vec::new();

    for line in &lines[1..] {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            if in_fence {
                // Closing fence: the first snippet in a block is its fix.
                if fix.is_none() && !fence_lines.is_empty() {
                    fix = Some(fence_lines.join("\n"));
                }
                fence_lines.clear();
            }
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            fence_lines.push(line.clone());
            continue;
        }

        let lower = trimmed.to_lowercase();

        if let Some(value) = labeled_value(&lower, trimmed, "severity") {
            if severity.is_none() {
                severity = value.parse::<Severity>().ok().or_else(|| find_severity_word(&value));
            }
            continue;
        }
        if let Some(value) = labeled_value(&lower, trimmed, "location") {
            for loc in value.split(',') {
                push_location(loc, &mut locations);
            }
            continue;
        }
        if let Some(value) = labeled_value(&lower, trimmed, "fix")
            .or_else(|| labeled_value(&lower, trimmed, "suggested fix"))
            .or_else(|| labeled_value(&lower, trimmed, "remediation"))
        {
            if fix.is_none() && !value.is_empty() {
                fix = Some(value);
            }
            continue;
        }

        if !trimmed.is_empty() {
            description_parts.push(trimmed.to_string());
            scan_location_tokens(trimmed, &mut locations);
        }
    }

    // Unterminated fence: still salvage the snippet.
    if in_fence && fix.is_none() && !fence_lines.is_empty() {
        fix = Some(fence_lines.join("\n"));
    }

    let description = description_parts.join(" ");

    if severity.is_none() {
        severity = find_severity_word(&description);
    }

    PredictedIssue {
        title,
        severity,
        locations,
        description,
        fix,
    }
}

/// Break a header line into (title, trailing description, severity).
fn parse_header(header: &str) -> (String, String, Option<Severity>) {
    let mut s = header.trim();

    if let Some(rest) = strip_numbered_marker(s) {
        s = rest;
    } else if let Some(rest) = strip_bullet_marker(s) {
        s = rest;
    }

    // `Issue #3:` / `Problem:` prefix
    let lower = s.to_lowercase();
    if lower.starts_with("issue") || lower.starts_with("problem") {
        if let Some(idx) = s.find(':') {
            // Only treat it as a marker when the prefix is short (`Issue #12`),
            // not when the whole title happens to start with the word.
            if s[..idx].split_whitespace().count() <= 2 {
                s = s[idx + 1..].trim_start();
            }
        }
    }

    let mut severity = None;
    if let Some((sev, rest)) = leading_severity_tag(s) {
        severity = Some(sev);
        return finish_header(rest, severity);
    }

    // Trailing tag: `Title (Critical)` / `Title [High]` / `**Title** - Critical`
    let stripped = strip_bold(s);
    let (mut title, rest) = match stripped.split_once(':') {
        Some((head, tail)) if !head.trim().is_empty() => {
            (head.trim().to_string(), tail.trim().to_string())
        }
        _ => (stripped.trim().to_string(), String::new()),
    };

    if severity.is_none() {
        severity = find_severity_word(&title).or_else(|| find_severity_word(&rest));
    }
    title = strip_severity_decoration(&title);

    if title.is_empty() {
        title = UNKNOWN_FIELD.to_string();
    }
    (title, rest, severity)
}

fn finish_header(rest: &str, severity: Option<Severity>) -> (String, String, Option<Severity>) {
    let stripped = strip_bold(rest.trim_start_matches([':', '-', ' ']));
    let (title, desc) = match stripped.split_once(':') {
        Some((head, tail)) if !head.trim().is_empty() => {
            (head.trim().to_string(), tail.trim().to_string())
        }
        _ => (stripped.trim().to_string(), String::new()),
    };
    let title = if title.is_empty() {
        UNKNOWN_FIELD.to_string()
    } else {
        title
    };
    (title, desc, severity)
}

/// Remove a `(Critical)` / `[High]` / bare trailing severity from a title.
fn strip_severity_decoration(title: &str) -> String {
    let mut out = title.trim().to_string();

    for sev in Severity::ALL {
        for pat in [
            format!("({})", sev),
            format!("[{}]", sev),
            format!("- {}", sev),
        ] {
            if let Some(pos) = find_ignore_case(&out, &pat) {
                out.replace_range(pos..pos + pat.len(), "");
            }
        }
    }

    out.trim().trim_end_matches(['-', ':', '.']).trim().to_string()
}

/// Byte-wise ASCII case-insensitive search; needle is always ASCII here, so
/// any match lands on char boundaries.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let ned = needle.as_bytes();
    if ned.is_empty() || hay.len() < ned.len() {
        return None;
    }
    (0..=hay.len() - ned.len()).find(|&i| {
        hay[i..i + ned.len()]
            .iter()
            .zip(ned)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

/// `label: value` lines, case-insensitive on the label.
fn labeled_value(lower: &str, original: &str, label: &str) -> Option<String> {
    if !lower.starts_with(label) {
        return None;
    }
    let rest = &lower[label.len()..];
    let colon = rest.find(':')?;
    // Reject e.g. `fixing the tests:` - the label must sit directly at the colon.
    if !rest[..colon].trim().is_empty() {
        return None;
    }
    Some(original[label.len() + colon + 1..].trim().to_string())
}

/// First severity keyword appearing as a whole word.
fn find_severity_word(text: &str) -> Option<Severity> {
    for token in text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if let Ok(sev) = token.parse::<Severity>() {
            return Some(sev);
        }
    }
    None
}

/// Collect `name:line` tokens and `line N` references from a line of prose.
fn scan_location_tokens(line: &str, out: &mut Vec<String>) {
    for raw in line.split_whitespace() {
        let token = raw
            .trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '.'))
            .trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
        if let Some((name, num)) = token.split_once(':') {
            if !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                && !num.is_empty()
                && num.chars().all(|c| c.is_ascii_digit())
            {
                push_location(token, out);
            }
        }
    }

    // `line 42` / `at line 42`
    let lower = line.to_lowercase();
    let mut search = 0;
    while let Some(pos) = lower[search..].find("line ") {
        let start = search + pos + 5;
        let digits: String = lower[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if !digits.is_empty() {
            push_location(&format!("line:{}", digits), out);
        }
        search = start;
    }
}

fn push_location(loc: &str, out: &mut Vec<String>) {
    let loc = loc.trim().trim_matches('`').to_string();
    if !loc.is_empty() && !out.contains(&loc) {
        out.push(loc);
    }
}

/// No structured blocks found: decide between clean output, a sentinel
/// issue, and unparseable text.
fn extract_fallback(text: &str) -> Extraction {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    const CLEAN_MARKERS: [&str; 5] = [
        "no issues",
        "no problems",
        "looks good",
        "lgtm",
        "nothing to report",
    ];

    if trimmed.is_empty() || CLEAN_MARKERS.iter().any(|m| lower.contains(m)) {
        return Extraction {
            issues: Vec::new(),
            fidelity: ExtractionFidelity::FullyParsed,
        };
    }

    // A severity keyword plus prose strongly resembles a finding; keep it as
    // a sentinel issue rather than dropping it.
    if let Some(severity) = find_severity_word(trimmed) {
        let mut locations = Vec::new();
        for line in trimmed.lines() {
            scan_location_tokens(line, &mut locations);
        }
        let description = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");

        debug!(severity = %severity, "Salvaged sentinel issue from unstructured output");

        return Extraction {
            issues: vec![PredictedIssue {
                title: UNKNOWN_FIELD.to_string(),
                severity: Some(severity),
                locations,
                description,
                fix: None,
            }],
            fidelity: ExtractionFidelity::PartiallyParsed,
        };
    }

    Extraction {
        issues: Vec::new(),
        fidelity: ExtractionFidelity::Unparseable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_numbered_list() {
        let text = r#"
I found the following problems:

1. SQL Injection (Critical): user input is concatenated into the query in authenticate_user:12.
   An attacker can bypass authentication entirely.
   Fix: use parameterized queries.

2. Weak password hashing (High)
   MD5 is used in create_user:24, which allows fast brute-force attacks.
"#;
        let extraction = extract_issues(text);
        assert_eq!(extraction.fidelity, ExtractionFidelity::FullyParsed);
        assert_eq!(extraction.issues.len(), 2);

        let first = &extraction.issues[0];
        assert_eq!(first.title, "SQL Injection");
        assert_eq!(first.severity, Some(Severity::Critical));
        assert!(first.locations.contains(&"authenticate_user:12".to_string()));
        assert_eq!(first.fix.as_deref(), Some("use parameterized queries."));

        let second = &extraction.issues[1];
        assert_eq!(second.title, "Weak password hashing");
        assert_eq!(second.severity, Some(Severity::High));
        assert!(second.locations.contains(&"create_user:24".to_string()));
    }

    #[test]
    fn test_extract_bold_headers_with_fenced_fix() {
        let text = r#"
**Hardcoded credentials**
Severity: High
Location: load_config:7
The API key is committed to source control and exposes production data.

```python
api_key = os.environ["API_KEY"]
```

**Unbounded recursion**
Severity: Medium
flatten:31 recurses without a depth limit.
"#;
        let extraction = extract_issues(text);
        assert_eq!(extraction.fidelity, ExtractionFidelity::FullyParsed);
        assert_eq!(extraction.issues.len(), 2);

        let first = &extraction.issues[0];
        assert_eq!(first.title, "Hardcoded credentials");
        assert_eq!(first.severity, Some(Severity::High));
        assert_eq!(first.locations, vec!["load_config:7".to_string()]);
        assert_eq!(first.fix.as_deref(), Some(r#"api_key = os.environ["API_KEY"]"#));

        assert_eq!(extraction.issues[1].severity, Some(Severity::Medium));
        assert!(extraction.issues[1]
            .locations
            .contains(&"flatten:31".to_string()));
    }

    #[test]
    fn test_extract_issue_markers_and_bullets() {
        let text = r#"
Issue #1: Race condition on shared counter
The counter in increment:9 is read and written without a lock, which leads to lost updates under load. Severity: High

- [Low] Inconsistent naming between fetchUser and get_account
"#;
        let extraction = extract_issues(text);
        assert_eq!(extraction.issues.len(), 2);
        assert_eq!(extraction.issues[0].title, "Race condition on shared counter");
        assert_eq!(extraction.issues[0].severity, Some(Severity::High));
        assert_eq!(extraction.issues[1].severity, Some(Severity::Low));
    }

    #[test]
    fn test_extract_empty_text_is_clean() {
        let extraction = extract_issues("");
        assert!(extraction.is_empty());
        assert_eq!(extraction.fidelity, ExtractionFidelity::FullyParsed);
    }

    #[test]
    fn test_extract_no_issues_declaration_is_clean() {
        let extraction = extract_issues("I reviewed the diff carefully and found no issues.");
        assert!(extraction.is_empty());
        assert_eq!(extraction.fidelity, ExtractionFidelity::FullyParsed);
    }

    #[test]
    fn test_extract_sentinel_for_unstructured_finding() {
        let text = "there is a critical flaw somewhere in the auth flow, near validate_token:88";
        let extraction = extract_issues(text);
        assert_eq!(extraction.fidelity, ExtractionFidelity::PartiallyParsed);
        assert_eq!(extraction.issues.len(), 1);

        let issue = &extraction.issues[0];
        assert_eq!(issue.title, UNKNOWN_FIELD);
        assert_eq!(issue.severity, Some(Severity::Critical));
        assert!(issue.locations.contains(&"validate_token:88".to_string()));
    }

    #[test]
    fn test_extract_unparseable_prose() {
        let extraction = extract_issues("The weather is nice today.");
        assert!(extraction.is_empty());
        assert_eq!(extraction.fidelity, ExtractionFidelity::Unparseable);
    }

    #[test]
    fn test_extract_preserves_duplicate_titles() {
        let text = r#"
1. Missing input validation (Medium): name is unchecked in create_user:3.
2. Missing input validation (Medium): email is unchecked in create_user:5.
"#;
        let extraction = extract_issues(text);
        assert_eq!(extraction.issues.len(), 2);
        assert_eq!(extraction.issues[0].title, extraction.issues[1].title);
        assert_ne!(extraction.issues[0].locations, extraction.issues[1].locations);
    }

    #[test]
    fn test_extract_missing_severity_is_partial() {
        let text = "1. Inconsistent error handling: some paths return None, others raise.";
        let extraction = extract_issues(text);
        assert_eq!(extraction.fidelity, ExtractionFidelity::PartiallyParsed);
        assert_eq!(extraction.issues.len(), 1);
        assert_eq!(extraction.issues[0].severity, None);
    }
}
