//! Input validators for user-supplied funnel content.
//!
//! Every validator fails closed and never panics: malformed input comes back
//! as an invalid [`ValidationResult`] carrying a user-facing message that a
//! route handler can return as a 400 body.

pub mod text;

use serde::{Deserialize, Serialize};

pub use text::{
    DEFAULT_MAX_PAGE_LIMIT, DEFAULT_PAGE_LIMIT, MAX_EMAIL_LENGTH, MAX_SLUG_LENGTH,
    pagination_limit, parse_pagination_limit, validate_email, validate_pagination_limit,
    validate_slug, validate_text_length,
};

/// Outcome of a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the input was accepted
    pub valid: bool,
    /// User-facing reason for rejection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    /// An accepted input.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    /// A rejected input with a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(message.into()),
        }
    }

    /// Message for a rejected input, `None` when valid.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Convert into a `Result`, useful with `?` in handlers.
    pub fn into_result(self) -> std::result::Result<(), String> {
        if self.valid {
            Ok(())
        } else {
            Err(self.error.unwrap_or_else(|| "Invalid input".to_string()))
        }
    }
}
