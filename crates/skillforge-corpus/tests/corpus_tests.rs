use std::fs;

use skillforge_corpus::load_corpus;
use skillforge_review::Severity;
use tempfile::TempDir;

fn write_corpus(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_inline_code() {
    let dir = TempDir::new().unwrap();
    let path = write_corpus(
        &dir,
        "train.json",
        r#"{
  "cases": [
    {
      "id": "auth-1",
      "language": "python",
      "code": "def authenticate_user(username, password):\n    query = \"SELECT * FROM users WHERE name = '\" + username + \"'\"\n",
      "expected_issues": [
        {
          "title": "SQL injection in authentication query",
          "severity": "Critical",
          "locations": ["authenticate_user:2"],
          "fix": "Use parameterized queries instead of string concatenation"
        }
      ]
    },
    {
      "id": "clean-1",
      "language": "python",
      "code": "def add(a, b):\n    return a + b\n",
      "expected_issues": []
    }
  ]
}"#,
    );

    let corpus = load_corpus(&path).unwrap();
    assert_eq!(corpus.len(), 2);

    let first = &corpus.examples()[0];
    assert_eq!(first.id, "auth-1");
    assert_eq!(first.language, "python");
    assert_eq!(first.expected_issues.len(), 1);
    assert_eq!(first.expected_issues[0].severity, Severity::Critical);

    assert!(corpus.examples()[1].is_clean());
}

#[test]
fn test_load_code_file_reference() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("sample.py"), "print('hello')\n").unwrap();

    let path = write_corpus(
        &dir,
        "train.json",
        r#"{
  "cases": [
    {
      "id": "file-1",
      "language": "python",
      "code_file": "sample.py",
      "expected_issues": []
    }
  ]
}"#,
    );

    let corpus = load_corpus(&path).unwrap();
    assert_eq!(corpus.examples()[0].code, "print('hello')\n");
}

#[test]
fn test_missing_code_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_corpus(
        &dir,
        "train.json",
        r#"{
  "cases": [
    {"id": "file-1", "language": "python", "code_file": "nope.py", "expected_issues": []}
  ]
}"#,
    );

    let err = load_corpus(&path).unwrap_err().to_string();
    assert!(err.contains("nope.py"), "unexpected error: {}", err);
}

#[test]
fn test_duplicate_title_severity_pair_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_corpus(
        &dir,
        "train.json",
        r#"{
  "cases": [
    {
      "id": "dup-1",
      "language": "python",
      "code": "x = 1",
      "expected_issues": [
        {"title": "Missing validation", "severity": "High", "locations": ["f:1"], "fix": "validate"},
        {"title": "missing validation", "severity": "High", "locations": ["f:2"], "fix": "validate"}
      ]
    }
  ]
}"#,
    );

    let err = load_corpus(&path).unwrap_err().to_string();
    assert!(err.contains("duplicate"), "unexpected error: {}", err);
}

#[test]
fn test_same_title_different_severity_allowed() {
    let dir = TempDir::new().unwrap();
    let path = write_corpus(
        &dir,
        "train.json",
        r#"{
  "cases": [
    {
      "id": "dup-2",
      "language": "python",
      "code": "x = 1",
      "expected_issues": [
        {"title": "Missing validation", "severity": "High", "locations": ["f:1"], "fix": "validate"},
        {"title": "Missing validation", "severity": "Low", "locations": ["f:2"], "fix": "validate"}
      ]
    }
  ]
}"#,
    );

    let corpus = load_corpus(&path).unwrap();
    assert_eq!(corpus.examples()[0].expected_issues.len(), 2);
}

#[test]
fn test_unknown_severity_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_corpus(
        &dir,
        "train.json",
        r#"{
  "cases": [
    {
      "id": "sev-1",
      "language": "python",
      "code": "x = 1",
      "expected_issues": [
        {"title": "Oops", "severity": "Urgent", "locations": ["f:1"], "fix": "fix it"}
      ]
    }
  ]
}"#,
    );

    assert!(load_corpus(&path).is_err());
}

#[test]
fn test_issue_without_location_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_corpus(
        &dir,
        "train.json",
        r#"{
  "cases": [
    {
      "id": "loc-1",
      "language": "python",
      "code": "x = 1",
      "expected_issues": [
        {"title": "Oops", "severity": "High", "locations": [], "fix": "fix it"}
      ]
    }
  ]
}"#,
    );

    let err = load_corpus(&path).unwrap_err().to_string();
    assert!(err.contains("location"), "unexpected error: {}", err);
}
