//! Error types for Pacer.

use std::time::Duration;

use thiserror::Error;

/// Main error type for Pacer operations.
#[derive(Error, Debug)]
pub enum PacerError {
    /// An action was throttled; the client may retry after `retry_after`.
    #[error("Rate limit exceeded for {action}, retry after {retry_after:?}")]
    RateLimitExceeded {
        action: String,
        retry_after: Duration,
    },

    /// The client supplied a cursor that cannot be resumed from.
    /// Pagination has to restart from the first page.
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Unrecognised sort identifier
    #[error("Invalid sort: {0}")]
    InvalidSortSpec(String),

    /// Page size outside the accepted range
    #[error("Invalid limit: {0}")]
    InvalidLimit(i64),

    /// No rate limit policy is configured for an action
    #[error("No rate limit policy for action: {0}")]
    UnknownAction(String),

    /// Counter store or page source backend failure
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PacerError {
    /// Whether the error was caused by the client's input and should be
    /// reported back to it rather than logged as a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PacerError::RateLimitExceeded { .. }
                | PacerError::InvalidCursor(_)
                | PacerError::InvalidSortSpec(_)
                | PacerError::InvalidLimit(_)
        )
    }

    /// Whether repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PacerError::RateLimitExceeded { .. } | PacerError::StoreUnavailable(_)
        )
    }

    /// The wait hint attached to a rate limit denial.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PacerError::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for PacerError {
    fn from(e: config::ConfigError) -> Self {
        PacerError::Config(e.to_string())
    }
}

/// Result type alias for Pacer operations.
pub type Result<T> = std::result::Result<T, PacerError>;
