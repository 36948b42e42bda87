//! Error handling for the block miner
//!
//! Every failure of the mining operation is surfaced as an explicit variant;
//! nothing is logged-and-ignored or replaced with a placeholder value.

use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for mining operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the block miner
#[derive(Error, Debug)]
pub enum Error {
    /// Difficulty is negative, fractional, out of range or not a number
    #[error("Invalid difficulty: {value} (expected a non-negative integer)")]
    InvalidDifficulty { value: String },

    /// Nonce text is not a canonical decimal counter
    #[error("Invalid nonce: {message}")]
    Nonce { message: String },

    /// The configured iteration bound was reached without a solution
    #[error("Search exhausted after {attempts} attempts without a solution")]
    SearchExhausted { attempts: u64 },

    /// The caller cancelled the search
    #[error("Operation was cancelled: {operation}")]
    Cancelled { operation: String },

    /// The search deadline passed
    #[error("Operation timed out after {}: {operation}", humantime::format_duration(*after))]
    Timeout { operation: String, after: Duration },

    /// Transaction source errors
    #[error("Transaction source error: {message}")]
    Transactions { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create an invalid difficulty error
    pub fn invalid_difficulty(value: impl ToString) -> Self {
        Self::InvalidDifficulty {
            value: value.to_string(),
        }
    }

    /// Create a nonce error
    pub fn nonce(message: impl Into<String>) -> Self {
        Self::Nonce {
            message: message.into(),
        }
    }

    /// Create a search exhausted error
    pub fn search_exhausted(attempts: u64) -> Self {
        Self::SearchExhausted { attempts }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Create a transaction source error
    pub fn transactions(message: impl Into<String>) -> Self {
        Self::Transactions {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the search was stopped from outside rather than failing on its own
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Cancelled { .. } | Error::Timeout { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidDifficulty { .. } => "invalid_difficulty",
            Error::Nonce { .. } => "nonce",
            Error::SearchExhausted { .. } => "search_exhausted",
            Error::Cancelled { .. } => "cancelled",
            Error::Timeout { .. } => "timeout",
            Error::Transactions { .. } => "transactions",
            Error::Config { .. } => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
        }
    }

    /// Process exit code for the command-line wrapper
    ///
    /// Input problems exit with 2, search failures with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidDifficulty { .. }
            | Error::Nonce { .. }
            | Error::Config { .. }
            | Error::Transactions { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::Yaml(_) => 2,
            Error::SearchExhausted { .. } | Error::Cancelled { .. } | Error::Timeout { .. } => 1,
        }
    }
}

impl From<Infallible> for Error {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_difficulty(-1);
        assert_eq!(
            err.to_string(),
            "Invalid difficulty: -1 (expected a non-negative integer)"
        );

        let err = Error::timeout("mining", Duration::from_secs(3));
        assert_eq!(err.to_string(), "Operation timed out after 3s: mining");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::search_exhausted(10).category(), "search_exhausted");
        assert_eq!(Error::cancelled("mining").category(), "cancelled");
        assert_eq!(Error::config("bad").category(), "config");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::invalid_difficulty("x").exit_code(), 2);
        assert_eq!(Error::search_exhausted(1).exit_code(), 1);
        assert_eq!(Error::cancelled("mining").exit_code(), 1);
    }

    #[test]
    fn test_is_interrupted() {
        assert!(Error::cancelled("mining").is_interrupted());
        assert!(Error::timeout("mining", Duration::from_millis(5)).is_interrupted());
        assert!(!Error::search_exhausted(5).is_interrupted());
    }
}
