use thiserror::Error;

/// Errors of the relay utility.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid record: expected {expected} bytes, got {actual}")]
    InvalidRecord { expected: usize, actual: usize },

    #[error("Driver error: {0}")]
    Driver(#[from] sonar_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
