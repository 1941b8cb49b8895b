//! Error types for funnel-guard
//!
//! Validators never produce these: a rejected input is a
//! [`ValidationResult`](crate::validation::ValidationResult), not an error.
//! This enum covers configuration, policy compilation and address resolution.

use std::io;

use thiserror::Error;

/// Result type alias for funnel-guard
pub type Result<T> = std::result::Result<T, Error>;

/// funnel-guard errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configured host pattern is not a valid regular expression
    #[error("Invalid host pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },

    /// Host resolution failed
    #[error("Resolution failed: {0}")]
    Resolve(String),

    /// Outbound target rejected by the address policy
    #[error("Blocked: {0}")]
    Blocked(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_names_the_pattern() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = Error::InvalidPattern {
            pattern: "(".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("Invalid host pattern '('"));
    }

    #[test]
    fn io_errors_convert() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "IO error: gone");
    }
}
