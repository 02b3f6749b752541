use std::time::Duration;
use thiserror::Error;

/// Crate-wide error type returned by every seeking, processing, and
/// augmentation operation.
#[derive(Error, Debug)]
pub enum Error {
    // Validation / configuration (permanent failures, never retried)
    #[error("invalid query: {field} - {reason}")]
    InvalidQuery { field: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Provider-facing errors
    #[error("provider '{provider}' unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("rate limit exceeded for '{provider}': retry after {retry_after:?}")]
    RateLimitExceeded {
        provider: String,
        retry_after: Duration,
    },

    #[error("operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("network error talking to '{provider}': {message}")]
    NetworkError { provider: String, message: String },

    #[error("failed to parse response from '{provider}': {message}")]
    ParsingError { provider: String, message: String },

    // Transport-level conversions
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // Cache / storage
    #[error("cache error: {operation} failed - {reason}")]
    Cache { operation: String, reason: String },

    // Circuit breaker
    #[error("circuit breaker open for '{service}'")]
    CircuitBreakerOpen { service: String },

    #[error("circuit breaker half-open, limited calls allowed for '{service}'")]
    CircuitBreakerHalfOpen { service: String },

    #[error("{0}")]
    Other(String),
}

/// Error categorization used to select a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Permanent errors - should not be retried.
    Permanent,
    /// Transient errors - safe to retry with backoff.
    Transient,
    /// Rate limited - retry with backoff honoring `retry_after`.
    RateLimited,
    /// Circuit breaker triggered - stop retrying temporarily.
    CircuitBreaker,
}

impl Error {
    /// Categorize this error for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidQuery { .. }
            | Error::Configuration(_)
            | Error::Config(_)
            | Error::ParsingError { .. }
            | Error::Serde(_) => ErrorCategory::Permanent,

            Error::RateLimitExceeded { .. } => ErrorCategory::RateLimited,

            Error::CircuitBreakerOpen { .. } | Error::CircuitBreakerHalfOpen { .. } => {
                ErrorCategory::CircuitBreaker
            }

            Error::ProviderUnavailable { .. }
            | Error::Timeout { .. }
            | Error::NetworkError { .. }
            | Error::Http(_)
            | Error::Io(_)
            | Error::Cache { .. } => ErrorCategory::Transient,

            Error::Other(_) => ErrorCategory::Permanent,
        }
    }

    /// Whether this error is safe to retry automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::RateLimited
        )
    }

    /// Suggested delay before retrying, when the error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether this error should count against a circuit breaker.
    pub fn should_trigger_circuit_breaker(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable { .. } | Error::NetworkError { .. } | Error::Timeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
