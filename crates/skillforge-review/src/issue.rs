use serde::{Deserialize, Serialize};

/// Sentinel for fields the extractor could not recover from model output.
pub const UNKNOWN_FIELD: &str = "unknown";

/// Severity of a review finding.
///
/// Ordering follows declaration order, so `Critical` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Severity::Critical)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Ground-truth finding for one training/validation example.
///
/// Immutable once loaded from the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedIssue {
    /// Free-text title, unique per (title, severity) within an example
    pub title: String,
    pub severity: Severity,
    /// One or more location identifiers, e.g. `authenticate_user:12`
    pub locations: Vec<String>,
    /// Canonical fix description
    pub fix: String,
}

/// A finding extracted from raw model output.
///
/// Fields the extractor could not recover carry [`UNKNOWN_FIELD`] (title) or
/// `None` (severity, fix).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedIssue {
    pub title: String,
    pub severity: Option<Severity>,
    /// Zero or more location hints
    pub locations: Vec<String>,
    pub description: String,
    /// Suggested fix snippet, if the output contained one
    pub fix: Option<String>,
}

/// Phrases signalling that a description explains consequence, not just the fix.
const IMPACT_MARKERS: [&str; 9] = [
    "impact",
    "allows",
    "can ",
    "could",
    "enables",
    "leads to",
    "results in",
    "exposes",
    "risk",
];

impl PredictedIssue {
    /// True when the issue carries a non-empty fix snippet.
    pub fn has_fix(&self) -> bool {
        self.fix.as_deref().is_some_and(|f| !f.trim().is_empty())
    }

    /// True when the description contains an impact/consequence phrase,
    /// distinct from the fix itself.
    pub fn explains_impact(&self) -> bool {
        let text = self.description.to_lowercase();
        IMPACT_MARKERS.iter().any(|m| text.contains(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_severity_parse_case_insensitive() {
        assert_eq!(Severity::from_str("CRITICAL").unwrap(), Severity::Critical);
        assert_eq!(Severity::from_str("high").unwrap(), Severity::High);
        assert_eq!(Severity::from_str(" Medium ").unwrap(), Severity::Medium);
        assert!(Severity::from_str("urgent").is_err());
    }

    #[test]
    fn test_severity_display_round_trip() {
        for sev in Severity::ALL {
            assert_eq!(Severity::from_str(&sev.to_string()).unwrap(), sev);
        }
    }

    #[test]
    fn test_explains_impact() {
        let issue = PredictedIssue {
            title: "SQL injection".into(),
            severity: Some(Severity::Critical),
            locations: vec![],
            description: "Unsanitized input allows an attacker to read any row.".into(),
            fix: Some("use parameterized queries".into()),
        };
        assert!(issue.explains_impact());
        assert!(issue.has_fix());

        let bare = PredictedIssue {
            title: "Magic number".into(),
            severity: Some(Severity::Low),
            locations: vec![],
            description: "Replace 86400 with a named constant.".into(),
            fix: None,
        };
        assert!(!bare.explains_impact());
        assert!(!bare.has_fix());
    }
}
