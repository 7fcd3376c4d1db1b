use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::ModelOutput;

/// Errors from a model invocation.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("Failed to spawn model process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Model invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model backend not found: {0}")]
    NotFound(String),

    #[error("Model exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Model invocation failed: {0}")]
    Failed(String),
}

impl InvocationError {
    /// Timeouts are surfaced separately in run statistics.
    pub fn is_timeout(&self) -> bool {
        matches!(self, InvocationError::Timeout(_))
    }
}

/// Configuration for module invocations.
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    /// Per-invocation timeout (None = no limit)
    pub timeout: Option<Duration>,
    /// Model to use, if the backend supports selection
    pub model: Option<String>,
    /// Additional environment variables
    pub env_vars: HashMap<String, String>,
}

impl ModuleConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.env_vars.insert(key, value);
        self
    }
}

/// The candidate prompt module: an opaque mapping from (skill prompt,
/// example input) to raw review text.
///
/// Implementations must be safe to call concurrently across independent
/// examples.
#[async_trait]
pub trait ReviewModule: Send + Sync {
    /// Human-readable name of the backend
    fn name(&self) -> &str;

    /// Produce raw review text for one example.
    async fn review(
        &self,
        prompt: &str,
        code: &str,
        language: &str,
    ) -> Result<ModelOutput, InvocationError>;
}
