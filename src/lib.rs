//! funnel-guard
//!
//! Input validation and abuse protection for a funnel and lead-magnet page
//! builder. Route handlers call into this crate before persisting or acting
//! on anything a user typed.
//!
//! # Features
//!
//! - **URL policies**: SSRF screening for webhook targets, allow-listed video
//!   embed hosts, calendar booking domains ([`security`])
//! - **Resolved-address check**: connect-time rejection of private addresses
//!   for outbound deliveries ([`security::resolve`])
//! - **Field validators**: email, slug, text length, pagination ([`validation`])
//! - **CSV export**: formula-injection safe cell escaping ([`csv`])
//! - **Rate limiting**: keyed fixed windows with eviction and axum middleware
//!   ([`rate_limit`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod csv;
pub mod error;
pub mod rate_limit;
pub mod security;
pub mod validation;

pub use csv::escape_csv_value;
pub use error::{Error, Result};
pub use rate_limit::{RateLimitDecision, RateLimiter, rate_limit_key};
pub use security::{validate_calendly_url, validate_video_embed_url, validate_webhook_url};
pub use validation::{
    ValidationResult, validate_email, validate_pagination_limit, validate_slug,
    validate_text_length,
};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging (to stderr, so command output stays parseable)
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::Config(format!("invalid log level '{level}': {e}")))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| Error::Internal(format!("tracing already initialised: {e}")))
}
