use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SorterError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault (code {code})")]
    HardwareFault { code: i32 },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for drive")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing speed feedback")]
    MissingFeedback,
    #[error("missing line drive")]
    MissingDrive,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
