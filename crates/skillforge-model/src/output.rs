use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw output captured from one model invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOutput {
    /// The review text to extract issues from
    pub text: String,
    /// Anything the backend wrote to stderr
    pub stderr: String,
    /// Duration of the invocation
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl ModelOutput {
    pub fn new(text: String, stderr: String, duration: Duration) -> Self {
        Self {
            text,
            stderr,
            duration,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
