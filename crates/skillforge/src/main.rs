use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use skillforge_core::{
    compare_runs, Bootstrapper, ComparisonReport, DemonstrationSet, EvaluationRun,
    EvaluationRunner, RunConfig, SkillPrompts,
};
use skillforge_corpus::{load_corpus, Corpus};
use skillforge_logging::{init_tracing, LogFormat, Logger, RunEvent};
use skillforge_model::{CachedModule, CommandModule, ModuleConfig, ReviewModule};

mod config;

use config::ProjectConfig;

#[derive(Parser, Debug)]
#[command(
    name = "skillforge",
    about = "Evaluate and optimize code-review skill prompts",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Working directory for skillforge.toml discovery (default: current directory)
    #[arg(short = 'd', long)]
    working_dir: Option<PathBuf>,

    /// Backend CLI binary to invoke (default: claude)
    #[arg(short, long)]
    backend: Option<String>,

    /// Model to use (if the backend supports it)
    #[arg(short, long)]
    model: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Append run events as JSON lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score a skill prompt over a validation corpus
    Evaluate {
        /// Path to the skill markdown file
        skill: PathBuf,
        /// Path to the validation corpus JSON
        corpus: PathBuf,
        /// Demonstration set JSON to inject into the prompt
        #[arg(long)]
        demos: Option<PathBuf>,
        /// Label recorded on the run (default: skill file stem)
        #[arg(long)]
        label: Option<String>,
        /// Write the evaluation run here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Select few-shot demonstrations from a training corpus
    Bootstrap {
        /// Path to the skill markdown file
        skill: PathBuf,
        /// Path to the training corpus JSON
        corpus: PathBuf,
        /// Write the demonstration set here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Diff two evaluation runs
    Compare {
        /// Baseline evaluation run JSON
        baseline: PathBuf,
        /// Candidate evaluation run JSON
        candidate: PathBuf,
        /// Write the comparison report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Bootstrap demonstrations, evaluate baseline and optimized skill, compare
    Optimize {
        /// Path to the skill markdown file
        skill: PathBuf,
        /// Path to the training corpus JSON
        trainset: PathBuf,
        /// Path to the validation corpus JSON
        valset: PathBuf,
        /// Directory for all artifacts (default: skillforge-out)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    init_tracing("warn", log_format);

    let logger = match &cli.log_file {
        Some(path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };
    let logger = Arc::new(logger);

    let working_dir = cli
        .working_dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().expect("Failed to get current directory"));

    let project = ProjectConfig::load(&working_dir)?.unwrap_or_default();
    let run_config = project.run_config();
    // Fail on bad numbers before any model call.
    run_config.validate()?;

    // Built before the match so the `&cli` borrow ends before `cli.command`
    // is moved by the match arms. Construction is pure config (no I/O), so
    // building it for every command is behavior-neutral.
    let module = build_module(&cli, &project, &run_config);

    match cli.command {
        Command::Evaluate {
            skill,
            corpus,
            demos,
            label,
            output,
        } => {
            let (stem, skill_text) = read_skill(&skill)?;
            let label = label.unwrap_or(stem);
            let corpus = load_corpus(&corpus)?;
            let demos = match demos {
                Some(path) => read_artifact::<DemonstrationSet>(&path)?.demos,
                None => Vec::new(),
            };
            let prompt = SkillPrompts::build_review_prompt(&skill_text, &demos);

            let runner = EvaluationRunner::new(module, run_config, logger)?;
            let run = runner.run(&label, &prompt, &corpus).await;

            write_artifact(&run, output.as_deref())?;
        }
        Command::Bootstrap {
            skill,
            corpus,
            output,
        } => {
            let (_, skill_text) = read_skill(&skill)?;
            let corpus = load_corpus(&corpus)?;

            let bootstrapper = Bootstrapper::new(module, run_config, logger)?;
            let set = bootstrapper.bootstrap(&skill_text, &corpus).await;

            write_artifact(&set, output.as_deref())?;
        }
        Command::Compare {
            baseline,
            candidate,
            output,
        } => {
            let baseline: EvaluationRun = read_artifact(&baseline)?;
            let candidate: EvaluationRun = read_artifact(&candidate)?;

            let report = compare_runs(&baseline, &candidate, run_config.noise_threshold)?;
            log_comparison(&logger, &report);

            write_artifact(&report, output.as_deref())?;
        }
        Command::Optimize {
            skill,
            trainset,
            valset,
            output_dir,
        } => {
            let (stem, skill_text) = read_skill(&skill)?;
            let trainset = load_corpus(&trainset)?;
            let valset = load_corpus(&valset)?;
            let out_dir = output_dir.unwrap_or_else(|| PathBuf::from("skillforge-out"));
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;

            // One cached module for the whole pipeline, so the baseline and
            // optimized evaluations reuse identical outputs where inputs agree.
            let report = optimize(
                module,
                &run_config,
                &logger,
                &stem,
                &skill_text,
                &trainset,
                &valset,
                &out_dir,
            )
            .await?;

            log_comparison(&logger, &report);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// The full optimization pipeline: bootstrap on the trainset, evaluate the
/// bare and demo-augmented skill on the validation set, diff the runs.
/// All four artifacts land in `out_dir`.
#[allow(clippy::too_many_arguments)]
async fn optimize(
    module: Arc<dyn ReviewModule>,
    run_config: &RunConfig,
    logger: &Arc<Logger>,
    stem: &str,
    skill_text: &str,
    trainset: &Corpus,
    valset: &Corpus,
    out_dir: &Path,
) -> Result<ComparisonReport> {
    let bootstrapper = Bootstrapper::new(
        Arc::clone(&module),
        run_config.clone(),
        Arc::clone(logger),
    )?;
    let demos = bootstrapper.bootstrap(skill_text, trainset).await;
    write_artifact(&demos, Some(&out_dir.join("demos.json")))?;

    let runner = EvaluationRunner::new(module, run_config.clone(), Arc::clone(logger))?;

    let baseline_prompt = SkillPrompts::build_review_prompt(skill_text, &[]);
    let baseline = runner
        .run(&format!("{stem}-baseline"), &baseline_prompt, valset)
        .await;
    write_artifact(&baseline, Some(&out_dir.join("baseline_run.json")))?;

    let optimized_prompt = SkillPrompts::build_review_prompt(skill_text, &demos.demos);
    let optimized = runner
        .run(&format!("{stem}-optimized"), &optimized_prompt, valset)
        .await;
    write_artifact(&optimized, Some(&out_dir.join("optimized_run.json")))?;

    let report = compare_runs(&baseline, &optimized, run_config.noise_threshold)?;
    write_artifact(&report, Some(&out_dir.join("comparison.json")))?;

    Ok(report)
}

fn build_module(
    cli: &Cli,
    project: &ProjectConfig,
    run_config: &RunConfig,
) -> Arc<dyn ReviewModule> {
    let backend = cli
        .backend
        .clone()
        .or_else(|| project.backend.clone())
        .unwrap_or_else(|| "claude".to_string());

    let args = project
        .backend_args
        .clone()
        .unwrap_or_else(|| vec!["--print".to_string()]);

    let mut module_config = ModuleConfig::default().with_timeout(run_config.invoke_timeout());
    if let Some(model) = cli.model.clone().or_else(|| project.model.clone()) {
        module_config = module_config.with_model(model);
    }

    let mut command = CommandModule::new(backend).with_config(module_config);
    for arg in args {
        command = command.with_arg(arg);
    }

    Arc::new(CachedModule::new(command))
}

/// Read a skill file, returning (file stem, contents).
fn read_skill(path: &Path) -> Result<(String, String)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read skill file {}", path.display()))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("skill")
        .to_string();
    Ok((stem, text))
}

fn read_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Serialize an artifact to a file, or to stdout when no path is given.
fn write_artifact<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn log_comparison(logger: &Logger, report: &ComparisonReport) {
    logger.log(&RunEvent::ComparisonCompleted {
        verdict: report.verdict.to_string(),
        overall_delta: report.overall.delta,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_skill_uses_file_stem_as_label() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("code-review.md");
        std::fs::write(&path, "Review the code.").unwrap();

        let (stem, text) = read_skill(&path).unwrap();
        assert_eq!(stem, "code-review");
        assert_eq!(text, "Review the code.");
    }

    #[test]
    fn test_write_artifact_creates_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/out.json");
        write_artifact(&serde_json::json!({"ok": true}), Some(&path)).unwrap();
        assert!(path.exists());
    }
}
