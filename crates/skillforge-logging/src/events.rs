use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for evaluation and bootstrapping runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        skill: String,
        examples: usize,
        concurrency: usize,
    },
    ExampleEvaluated {
        index: usize,
        example_id: String,
        overall: f64,
        duration_secs: f64,
    },
    ExampleFailed {
        index: usize,
        example_id: String,
        error: String,
        timed_out: bool,
    },
    RunCompleted {
        run_id: String,
        mean_overall: f64,
        failure_rate: f64,
        duration_secs: f64,
    },
    BootstrapStarted {
        examples: usize,
        max_bootstrapped: usize,
        max_labeled: usize,
    },
    DemonstrationSelected {
        example_id: String,
        kind: String,
        overall: Option<f64>,
    },
    BootstrapCompleted {
        bootstrapped: usize,
        labeled: usize,
    },
    ComparisonCompleted {
        verdict: String,
        overall_delta: f64,
    },
}

impl RunEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for run events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &RunEvent) {
        // File sink is always JSON lines, whatever the console shows
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &RunEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &RunEvent) {
        let mut stderr = std::io::stderr();
        match event {
            RunEvent::RunStarted {
                skill,
                examples,
                concurrency,
                ..
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} {} ({} examples, concurrency {})",
                    "▶".bright_cyan(),
                    "EVALUATE".bright_cyan().bold(),
                    skill.bold(),
                    examples,
                    concurrency
                );
            }
            RunEvent::ExampleEvaluated {
                example_id,
                overall,
                duration_secs,
                ..
            } => {
                let score = format!("{:.2}", overall);
                let styled = if *overall >= 0.7 {
                    score.bright_green()
                } else if *overall >= 0.4 {
                    score.bright_yellow()
                } else {
                    score.bright_red()
                };
                let _ = writeln!(
                    stderr,
                    "    {} {} {} ({:.1}s)",
                    "✓".bright_green(),
                    pad_id(example_id),
                    styled,
                    duration_secs
                );
            }
            RunEvent::ExampleFailed {
                example_id,
                error,
                timed_out,
                ..
            } => {
                let reason = if *timed_out { "timeout" } else { error.as_str() };
                let _ = writeln!(
                    stderr,
                    "    {} {} {}",
                    "✗".bright_red(),
                    pad_id(example_id),
                    reason.bright_red()
                );
            }
            RunEvent::RunCompleted {
                mean_overall,
                failure_rate,
                duration_secs,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} mean overall {:.3}, failure rate {:.0}% ({:.1}s)",
                    "∑".bright_blue(),
                    mean_overall,
                    failure_rate * 100.0,
                    duration_secs
                );
            }
            RunEvent::BootstrapStarted {
                examples,
                max_bootstrapped,
                max_labeled,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} over {} examples (max {} bootstrapped + {} labeled)",
                    "▶".bright_magenta(),
                    "BOOTSTRAP".bright_magenta().bold(),
                    examples,
                    max_bootstrapped,
                    max_labeled
                );
            }
            RunEvent::DemonstrationSelected {
                example_id,
                kind,
                overall,
            } => {
                let score = overall
                    .map(|s| format!("{:.2}", s))
                    .unwrap_or_else(|| "-".to_string());
                let _ = writeln!(
                    stderr,
                    "    {} {} {} ({})",
                    "+".bright_green(),
                    pad_id(example_id),
                    score,
                    kind
                );
            }
            RunEvent::BootstrapCompleted {
                bootstrapped,
                labeled,
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} bootstrapped, {} labeled demonstrations",
                    "∑".bright_blue(),
                    bootstrapped,
                    labeled
                );
            }
            RunEvent::ComparisonCompleted {
                verdict,
                overall_delta,
            } => {
                let styled = match verdict.as_str() {
                    "improved" => verdict.bright_green().bold(),
                    "regressed" => verdict.bright_red().bold(),
                    _ => verdict.bright_yellow().bold(),
                };
                let _ = writeln!(
                    stderr,
                    "\n{} {} (overall delta {:+.3})",
                    "⇄".bright_blue(),
                    styled,
                    overall_delta
                );
            }
        }
    }

    fn log_compact(&self, event: &RunEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            RunEvent::RunStarted { examples, .. } => {
                format!("[{}] run:start n={}", timestamp, examples)
            }
            RunEvent::ExampleEvaluated {
                example_id,
                overall,
                ..
            } => format!("[{}] eval:{} {:.2}", timestamp, example_id, overall),
            RunEvent::ExampleFailed {
                example_id,
                timed_out,
                ..
            } => format!(
                "[{}] fail:{}{}",
                timestamp,
                example_id,
                if *timed_out { " (timeout)" } else { "" }
            ),
            RunEvent::RunCompleted {
                mean_overall,
                failure_rate,
                ..
            } => format!(
                "[{}] run:done mean={:.3} failures={:.0}%",
                timestamp,
                mean_overall,
                failure_rate * 100.0
            ),
            RunEvent::BootstrapStarted { examples, .. } => {
                format!("[{}] bootstrap:start n={}", timestamp, examples)
            }
            RunEvent::DemonstrationSelected {
                example_id, kind, ..
            } => format!("[{}] demo:{} ({})", timestamp, example_id, kind),
            RunEvent::BootstrapCompleted {
                bootstrapped,
                labeled,
            } => format!(
                "[{}] bootstrap:done b={} l={}",
                timestamp, bootstrapped, labeled
            ),
            RunEvent::ComparisonCompleted {
                verdict,
                overall_delta,
            } => format!(
                "[{}] compare:{} {:+.3}",
                timestamp, verdict, overall_delta
            ),
        };
        let _ = writeln!(stderr, "{}", msg);
    }
}

fn pad_id(id: &str) -> String {
    format!("{:<20}", id)
}
