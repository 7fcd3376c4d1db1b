use skillforge_review::ExpectedIssue;

use crate::bootstrap::Demonstration;

/// Prompt assembly for skill evaluation.
///
/// Rendering is deterministic: the same skill text and demonstration set
/// always produce the same prompt, so cached model outputs stay valid across
/// bootstrap-then-evaluate flows.
pub struct SkillPrompts;

impl SkillPrompts {
    /// Compose the full skill prompt, injecting few-shot demonstrations
    /// after the instructions.
    pub fn build_review_prompt(skill: &str, demos: &[Demonstration]) -> String {
        if demos.is_empty() {
            return skill.trim_end().to_string();
        }

        let mut prompt = String::from(skill.trim_end());
        prompt.push_str("\n\n## Examples\n");

        for (i, demo) in demos.iter().enumerate() {
            prompt.push_str(&format!(
                "\n### Example {} ({})\n\n```{}\n{}\n```\n\nExpected review:\n\n{}\n",
                i + 1,
                demo.example.language,
                demo.example.language,
                demo.example.code.trim_end(),
                truncate_output(demo.output.trim_end(), 4000),
            ));
        }

        prompt
    }

    /// Render ground-truth issues as demonstration output, in the same shape
    /// the extractor parses. This is what labeled demonstrations show the
    /// model in place of a bootstrapped output.
    pub fn render_expected_issues(issues: &[ExpectedIssue]) -> String {
        if issues.is_empty() {
            return "No issues found.".to_string();
        }

        let mut out = String::new();
        for (i, issue) in issues.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} ({})\n   Location: {}\n   Fix: {}\n",
                i + 1,
                issue.title,
                issue.severity,
                issue.locations.join(", "),
                issue.fix,
            ));
        }
        out.trim_end().to_string()
    }
}

fn truncate_output(output: &str, max_len: usize) -> &str {
    if output.len() <= max_len {
        output
    } else {
        // Truncate at a line boundary where possible
        if let Some(pos) = output[..max_len].rfind('\n') {
            &output[..pos]
        } else {
            &output[..max_len]
        }
    }
}
