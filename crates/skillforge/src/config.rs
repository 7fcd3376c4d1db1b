//! Project configuration file support for skillforge.
//!
//! Loads configuration from `skillforge.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use skillforge_core::RunConfig;

/// Project-level configuration loaded from `skillforge.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Backend CLI binary (e.g. `claude`)
    pub backend: Option<String>,
    /// Model passed through to the backend
    pub model: Option<String>,
    /// Extra flags for the backend invocation
    pub backend_args: Option<Vec<String>>,
    /// Numeric run parameters; missing fields fall back to defaults
    pub run: Option<RunConfig>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "skillforge.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Run parameters with file values applied over defaults.
    pub fn run_config(&self) -> RunConfig {
        self.run.clone().unwrap_or_default()
    }
}
