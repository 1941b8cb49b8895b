//! Email, slug, free-text and pagination validators.

use std::sync::LazyLock;

use regex::Regex;

use super::ValidationResult;

/// Longest email address accepted (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Longest slug accepted.
pub const MAX_SLUG_LENGTH: usize = 100;

/// Page size used when the caller sends nothing usable.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Upper bound applied by [`pagination_limit`].
pub const DEFAULT_MAX_PAGE_LIMIT: u32 = 100;

// Local part: atext plus dots. Domain: dot-separated labels of 1-63
// alphanumerics, hyphens only inside a label.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("slug pattern compiles"));

/// Check an email address for plausibility.
///
/// Permissive: technically valid but unusual local parts
/// (consecutive dots, `+` tags, quotes-free specials) are accepted.
#[must_use]
pub fn validate_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
        return false;
    }
    EMAIL_RE.is_match(email)
}

/// Check a public page slug: lowercase alphanumeric groups joined by single
/// hyphens.
#[must_use]
pub fn validate_slug(slug: &str) -> ValidationResult {
    if slug.is_empty() {
        return ValidationResult::invalid("Slug is required");
    }
    if slug.len() > MAX_SLUG_LENGTH {
        return ValidationResult::invalid(format!(
            "Slug must be {MAX_SLUG_LENGTH} characters or less"
        ));
    }
    if !SLUG_RE.is_match(slug) {
        return ValidationResult::invalid(
            "Slug can only contain lowercase letters, numbers, and single hyphens between words",
        );
    }
    ValidationResult::ok()
}

/// Check that an optional text field fits within `max_length` characters.
///
/// Missing and empty values are always valid; required-ness is the caller's
/// concern.
#[must_use]
pub fn validate_text_length(
    value: Option<&str>,
    field_name: &str,
    max_length: usize,
) -> ValidationResult {
    match value {
        Some(v) if v.chars().count() > max_length => ValidationResult::invalid(format!(
            "{field_name} must be {max_length} characters or less"
        )),
        _ => ValidationResult::ok(),
    }
}

/// Clamp a requested page size into `1..=max_limit`, substituting
/// [`DEFAULT_PAGE_LIMIT`] for NaN and values below one.
///
/// Fractional requests are truncated.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 1..=max_limit first
pub fn validate_pagination_limit(limit: f64, max_limit: u32) -> u32 {
    if limit.is_nan() || limit < 1.0 {
        return DEFAULT_PAGE_LIMIT;
    }
    if limit >= f64::from(max_limit) {
        max_limit
    } else {
        limit as u32
    }
}

/// [`validate_pagination_limit`] with [`DEFAULT_MAX_PAGE_LIMIT`].
#[must_use]
pub fn pagination_limit(limit: f64) -> u32 {
    validate_pagination_limit(limit, DEFAULT_MAX_PAGE_LIMIT)
}

/// Parse a raw `?limit=` query value and clamp it.
///
/// Missing or unparseable values fall back to [`DEFAULT_PAGE_LIMIT`].
#[must_use]
pub fn parse_pagination_limit(raw: Option<&str>, max_limit: u32) -> u32 {
    let limit = raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN);
    validate_pagination_limit(limit, max_limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── validate_email ────────────────────────────────────────────────

    #[test]
    fn email_accepts_plus_tags() {
        assert!(validate_email("user+tag@example.com"));
    }

    #[test]
    fn email_accepts_subdomains_and_hyphens() {
        assert!(validate_email("first.last@mail.my-company.co.uk"));
    }

    #[test]
    fn email_accepts_consecutive_dots_in_local_part() {
        assert!(validate_email("a..b@example.com"));
    }

    #[test]
    fn email_rejects_spaces() {
        assert!(!validate_email("user @example.com"));
    }

    #[test]
    fn email_rejects_missing_at() {
        assert!(!validate_email("user.example.com"));
    }

    #[test]
    fn email_rejects_label_edge_hyphens() {
        assert!(!validate_email("user@-example.com"));
        assert!(!validate_email("user@example-.com"));
    }

    #[test]
    fn email_rejects_overlong_label() {
        let label = "a".repeat(64);
        assert!(!validate_email(&format!("user@{label}.com")));
        let label = "a".repeat(63);
        assert!(validate_email(&format!("user@{label}.com")));
    }

    #[test]
    fn email_rejects_empty_and_overlong() {
        assert!(!validate_email(""));
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(!validate_email(&long));
    }

    // ── validate_slug ─────────────────────────────────────────────────

    #[test]
    fn slug_accepts_hyphenated_words() {
        assert!(validate_slug("my-lead-magnet").valid);
        assert!(validate_slug("guide2024").valid);
    }

    #[test]
    fn slug_rejects_bad_shapes() {
        for slug in [
            "My Lead Magnet",
            "slug_with_underscores",
            "--double-dash",
            "double--dash",
            "trailing-",
            "-leading",
            "UPPER",
        ] {
            assert!(!validate_slug(slug).valid, "{slug} should be rejected");
        }
    }

    #[test]
    fn slug_rejects_empty_with_message() {
        let result = validate_slug("");
        assert!(!result.valid);
        assert_eq!(result.error(), Some("Slug is required"));
    }

    #[test]
    fn slug_length_boundary() {
        assert!(validate_slug(&"a".repeat(100)).valid);
        let result = validate_slug(&"a".repeat(101));
        assert!(!result.valid);
        assert!(result.error().unwrap().contains("100"));
    }

    // ── validate_text_length ──────────────────────────────────────────

    #[test]
    fn text_length_missing_or_empty_is_valid() {
        assert!(validate_text_length(None, "Title", 5).valid);
        assert!(validate_text_length(Some(""), "Title", 0).valid);
    }

    #[test]
    fn text_length_boundary() {
        assert!(validate_text_length(Some("hello"), "Title", 5).valid);
        let result = validate_text_length(Some("hello!"), "Title", 5);
        assert!(!result.valid);
        assert_eq!(result.error(), Some("Title must be 5 characters or less"));
    }

    #[test]
    fn text_length_counts_characters_not_bytes() {
        assert!(validate_text_length(Some("äöü"), "Headline", 3).valid);
    }

    // ── pagination ────────────────────────────────────────────────────

    #[test]
    fn pagination_defaults_for_nan_and_small_values() {
        assert_eq!(pagination_limit(f64::NAN), 20);
        assert_eq!(pagination_limit(0.0), 20);
        assert_eq!(pagination_limit(-5.0), 20);
    }

    #[test]
    fn pagination_clamps_to_max() {
        assert_eq!(validate_pagination_limit(200.0, 100), 100);
        assert_eq!(validate_pagination_limit(f64::INFINITY, 50), 50);
    }

    #[test]
    fn pagination_passes_through_in_range() {
        assert_eq!(pagination_limit(25.0), 25);
        assert_eq!(pagination_limit(1.0), 1);
        assert_eq!(pagination_limit(25.9), 25);
    }

    #[test]
    fn pagination_parses_query_values() {
        assert_eq!(parse_pagination_limit(Some("50"), 100), 50);
        assert_eq!(parse_pagination_limit(Some(" 500 "), 100), 100);
        assert_eq!(parse_pagination_limit(Some("abc"), 100), 20);
        assert_eq!(parse_pagination_limit(None, 100), 20);
    }
}
