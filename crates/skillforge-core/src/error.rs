use thiserror::Error;

/// Invalid run configuration. Fatal at run start, never silently clamped.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("`{name}` must be within [0,1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },

    #[error("`{name}` must be at least 1")]
    ZeroCount { name: &'static str },

    #[error("`{name}` must be a positive number of seconds")]
    ZeroDuration { name: &'static str },

    #[error("`max_retries` must be at most {max}, got {got}")]
    RetriesOutOfBounds { max: u32, got: u32 },

    #[error("Invalid score weights: {0}")]
    Weights(#[from] skillforge_review::WeightsError),
}

/// Two evaluation runs cannot be compared.
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("Runs cover different validation sets: baseline has {baseline} examples, candidate has {candidate}")]
    SizeMismatch { baseline: usize, candidate: usize },

    #[error("Runs cover different validation sets: example {index} is `{baseline}` in the baseline but `{candidate}` in the candidate")]
    ExampleMismatch {
        index: usize,
        baseline: String,
        candidate: String,
    },
}
