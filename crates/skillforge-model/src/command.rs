use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, trace};

use crate::{InvocationError, ModelOutput, ModuleConfig, ReviewModule};

/// A module backed by an agent CLI invoked in non-interactive mode.
///
/// The skill prompt and the code under review are composed into a single
/// positional argument after `--`, so prompts starting with `-` are never
/// interpreted as options.
pub struct CommandModule {
    binary_path: PathBuf,
    /// Backend-specific flags, e.g. `--print` for claude
    extra_args: Vec<String>,
    config: ModuleConfig,
}

impl CommandModule {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary.into(),
            extra_args: Vec::new(),
            config: ModuleConfig::default(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn with_config(mut self, config: ModuleConfig) -> Self {
        self.config = config;
        self
    }

    /// Check if the backend CLI is available on the system.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// The single request text handed to the backend.
    fn compose_request(prompt: &str, code: &str, language: &str) -> String {
        format!(
            "{prompt}\n\n## Code to review ({language})\n\n```{language}\n{code}\n```\n"
        )
    }

    async fn spawn_capture(&self, input: &str) -> Result<ModelOutput, InvocationError> {
        let start = Instant::now();

        let mut args: Vec<&str> = self.extra_args.iter().map(String::as_str).collect();

        let model_arg;
        if let Some(ref model) = self.config.model {
            args.push("--model");
            model_arg = model.clone();
            args.push(&model_arg);
        }
        args.push("--");
        args.push(input);

        debug!(
            binary = %self.binary_path.display(),
            input_len = input.len(),
            "Spawning model process"
        );

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());

        for (key, value) in &self.config.env_vars {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InvocationError::NotFound(self.binary_path.display().to_string())
            } else {
                InvocationError::SpawnFailed(e)
            }
        })?;

        let drained = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, drain(&mut child)).await {
                Ok(result) => result?,
                Err(_) => {
                    let _ = child.start_kill();
                    return Err(InvocationError::Timeout(limit));
                }
            },
            None => drain(&mut child).await?,
        };

        let (stdout, stderr, exit_code) = drained;
        let duration = start.elapsed();

        debug!(
            exit_code,
            duration_ms = duration.as_millis(),
            "Model process completed"
        );

        if exit_code != 0 {
            return Err(InvocationError::NonZeroExit {
                code: exit_code,
                stderr,
            });
        }

        Ok(ModelOutput::new(stdout, stderr, duration))
    }
}

/// Read both streams concurrently until the process exits.
async fn drain(child: &mut Child) -> Result<(String, String, i32), InvocationError> {
    let stdout_handle = child.stdout.take().expect("stdout not captured");
    let stderr_handle = child.stderr.take().expect("stderr not captured");

    let mut stdout_reader = BufReader::new(stdout_handle).lines();
    let mut stderr_reader = BufReader::new(stderr_handle).lines();

    let mut stdout = String::new();
    let mut stderr = String::new();

    loop {
        tokio::select! {
            biased;

            result = stdout_reader.next_line() => {
                match result {
                    Ok(Some(line)) => {
                        trace!(line = %line, "stdout");
                        if !stdout.is_empty() {
                            stdout.push('\n');
                        }
                        stdout.push_str(&line);
                    }
                    Ok(None) => {
                        // stdout closed; let stderr finish too
                        while let Ok(Some(line)) = stderr_reader.next_line().await {
                            if !stderr.is_empty() {
                                stderr.push('\n');
                            }
                            stderr.push_str(&line);
                        }
                        break;
                    }
                    Err(e) => {
                        return Err(InvocationError::Failed(format!(
                            "Failed to read stdout: {}",
                            e
                        )));
                    }
                }
            }
            result = stderr_reader.next_line() => {
                match result {
                    Ok(Some(line)) => {
                        trace!(line = %line, "stderr");
                        if !stderr.is_empty() {
                            stderr.push('\n');
                        }
                        stderr.push_str(&line);
                    }
                    Ok(None) => {
                        // stderr closed, keep draining stdout
                    }
                    Err(e) => {
                        return Err(InvocationError::Failed(format!(
                            "Failed to read stderr: {}",
                            e
                        )));
                    }
                }
            }
        }
    }

    let status = child.wait().await?;
    Ok((stdout, stderr, status.code().unwrap_or(-1)))
}

#[async_trait]
impl ReviewModule for CommandModule {
    fn name(&self) -> &str {
        self.binary_path.to_str().unwrap_or("command")
    }

    async fn review(
        &self,
        prompt: &str,
        code: &str,
        language: &str,
    ) -> Result<ModelOutput, InvocationError> {
        let input = Self::compose_request(prompt, code, language);
        self.spawn_capture(&input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_request_fences_code() {
        let request = CommandModule::compose_request("Review this.", "x = 1", "python");
        assert!(request.starts_with("Review this."));
        assert!(request.contains("```python\nx = 1\n```"));
    }
}
