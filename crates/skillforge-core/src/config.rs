use serde::{Deserialize, Serialize};
use std::time::Duration;

use skillforge_review::{MatcherConfig, ScoreWeights};

use crate::error::ConfigError;

/// Upper bound on per-invocation retries; beyond this a failing backend
/// turns one bad example into an unbounded stall.
pub const MAX_RETRY_BOUND: u32 = 10;

/// The numeric configuration surface for evaluation and bootstrapping.
///
/// No behavior is configured via code: everything tunable lives here, with
/// the defaults below. [`RunConfig::validate`] rejects out-of-range values at
/// run start rather than clamping them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Similarity acceptance threshold and weights for issue matching
    pub matcher: MatcherConfig,
    /// Weights of the overall composite score
    pub weights: ScoreWeights,
    /// Minimum overall score for a model output to become a demonstration
    pub demo_threshold: f64,
    /// Cap on score-selected demonstrations
    pub max_bootstrapped_demos: usize,
    /// Cap on ground-truth demonstrations used to fill a shortfall
    pub max_labeled_demos: usize,
    /// Concurrent model invocations
    pub concurrency: usize,
    /// Per-invocation timeout in seconds
    pub invoke_timeout_secs: u64,
    /// Optional whole-run deadline in seconds
    pub run_timeout_secs: Option<u64>,
    /// Retries per invocation after the first attempt
    pub max_retries: u32,
    /// Base backoff between retries; grows linearly per attempt
    pub retry_backoff_ms: u64,
    /// Minimum overall-mean delta for a comparison to count as a change
    pub noise_threshold: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherConfig::default(),
            weights: ScoreWeights::default(),
            demo_threshold: 0.5,
            max_bootstrapped_demos: 4,
            max_labeled_demos: 8,
            concurrency: 4,
            invoke_timeout_secs: 120,
            run_timeout_secs: None,
            max_retries: 2,
            retry_backoff_ms: 500,
            noise_threshold: 0.01,
        }
    }
}

impl RunConfig {
    /// Validate every parameter. Called once at run start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("matcher.acceptance_threshold", self.matcher.acceptance_threshold),
            ("matcher.text_weight", self.matcher.text_weight),
            ("matcher.location_weight", self.matcher.location_weight),
            ("demo_threshold", self.demo_threshold),
            ("noise_threshold", self.noise_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }

        self.weights.validate()?;

        if self.concurrency == 0 {
            return Err(ConfigError::ZeroCount {
                name: "concurrency",
            });
        }
        if self.invoke_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                name: "invoke_timeout_secs",
            });
        }
        if self.run_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroDuration {
                name: "run_timeout_secs",
            });
        }
        if self.max_retries > MAX_RETRY_BOUND {
            return Err(ConfigError::RetriesOutOfBounds {
                max: MAX_RETRY_BOUND,
                got: self.max_retries,
            });
        }

        Ok(())
    }

    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_secs(self.invoke_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    /// Backoff before retry `attempt` (1-based), growing linearly.
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms * attempt as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = RunConfig::default();
        config.demo_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfUnitRange {
                name: "demo_threshold",
                ..
            })
        ));

        config.demo_threshold = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = RunConfig::default();
        config.concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroCount { .. })
        ));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = RunConfig::default();
        config.invoke_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.run_timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_excessive_retries_rejected() {
        let mut config = RunConfig::default();
        config.max_retries = MAX_RETRY_BOUND + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RetriesOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_negative_weights_rejected() {
        let mut config = RunConfig::default();
        config.weights.fix_quality = -0.3;
        assert!(matches!(config.validate(), Err(ConfigError::Weights(_))));
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"concurrency": 8}"#).unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.max_bootstrapped_demos, 4);
        assert!(config.validate().is_ok());
    }
}
