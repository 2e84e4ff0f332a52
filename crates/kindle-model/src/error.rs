use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--test-size argument must be > 0")]
    InvalidSize,
    #[error("--{0} only works with --test-size=N")]
    RequiresSize(&'static str),
    #[error("--test-hosts hostlist has incorrect size (expected {expected}, got {actual})")]
    HostlistSize { expected: usize, actual: usize },
    #[error("broker path is empty")]
    MissingBroker,
    #[error("invalid killer timeout: {0}")]
    Timeout(#[from] DurationError),
    #[error("could not decode --test-hosts hostlist: {0}")]
    Hostlist(#[from] HostlistError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration '{0}' (expected N[smhd])")]
    Invalid(String),
    #[error("duration must be >= 0")]
    Negative,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostlistError {
    #[error("empty hostlist")]
    Empty,
    #[error("unbalanced brackets in '{0}'")]
    Unbalanced(String),
    #[error("invalid range '{0}'")]
    InvalidRange(String),
}
