//! Error types for the service layer

use thiserror::Error;

/// Service-wide error type
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PulseError {
    pub fn api(msg: impl Into<String>) -> Self {
        PulseError::Api(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        PulseError::Network(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        PulseError::RateLimited(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        PulseError::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        PulseError::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PulseError::Internal(msg.into())
    }

    /// Whether this error signals upstream throttling and is worth retrying
    /// with backoff. Everything else fails fast.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PulseError::RateLimited(_))
    }
}

/// Result type alias for service operations
pub type PulseResult<T> = Result<T, PulseError>;
