use std::time::Duration;
use thiserror::Error;

/// Screening pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Provider returned an error or an unusable answer
    #[error("Screening provider error: {0}")]
    Provider(String),

    /// One provider attempt exceeded its timeout
    #[error("Screening provider timed out after {0} ms")]
    Timeout(u64),

    /// Operator exhausted its rate-limit window
    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited {
        /// Time until the window resets
        retry_after: Duration,
    },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bridge refused the call
    #[error("Bridge error: {0}")]
    Bridge(#[from] oracle_bridge::Error),

    /// Transport failure talking to the provider
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Pipeline result
pub type Result<T> = std::result::Result<T, PipelineError>;
