//! URL policies for user-supplied links.
//!
//! Three checks share one compiled policy:
//!
//! - **Webhooks** are fetched server-side, so their hosts are screened
//!   against literal deny hosts, private-range patterns and cloud metadata
//!   keywords (SSRF).
//! - **Video embeds** end up in an iframe, so only known video hosts pass.
//! - **Calendar links** must point at the booking provider's domain.
//!
//! All checks look at the hostname text in the URL, not the address it
//! resolves to. See [`super::resolve`] for the connect-time check.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::validation::ValidationResult;
use crate::{Error, Result};

/// Hosts that are never valid webhook targets.
const DEFAULT_BLOCKED_HOSTS: &[&str] = &[
    "localhost",
    "127.0.0.1",
    "0.0.0.0",
    "::1",
    "169.254.169.254",
    "metadata.google.internal",
    "100.100.100.200",
];

/// Private, loopback and link-local ranges, matched against the host text.
const DEFAULT_BLOCKED_HOST_PATTERNS: &[&str] = &[
    r"^10\.",
    r"^172\.(1[6-9]|2[0-9]|3[0-1])\.",
    r"^192\.168\.",
    r"^127\.",
    r"^0\.",
    r"^169\.254\.",
    r"^fc00:",
    r"^fe80:",
];

/// Substrings that identify cloud instance metadata services.
const DEFAULT_BLOCKED_HOST_KEYWORDS: &[&str] = &["metadata", "instance-data"];

const DEFAULT_VIDEO_HOSTS: &[&str] = &[
    "www.youtube.com",
    "youtube.com",
    "youtu.be",
    "www.loom.com",
    "loom.com",
    "player.vimeo.com",
    "vimeo.com",
    "fast.wistia.net",
    "wistia.com",
];

const DEFAULT_CALENDAR_DOMAINS: &[&str] = &["calendly.com", "*.calendly.com"];

fn to_strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

/// URL policy configuration.
///
/// Domain lists accept exact hosts and `*.example.com` entries, which match
/// any subdomain of `example.com` (but not the apex itself).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlPolicyConfig {
    /// Literal hosts rejected for webhooks
    pub blocked_hosts: Vec<String>,
    /// Regular expressions rejected for webhooks, matched against the host
    pub blocked_host_patterns: Vec<String>,
    /// Host substrings rejected for webhooks
    pub blocked_host_keywords: Vec<String>,
    /// Hosts allowed as video embeds
    pub video_hosts: Vec<String>,
    /// Domains allowed for calendar booking links
    pub calendar_domains: Vec<String>,
}

impl Default for UrlPolicyConfig {
    fn default() -> Self {
        Self {
            blocked_hosts: to_strings(DEFAULT_BLOCKED_HOSTS),
            blocked_host_patterns: to_strings(DEFAULT_BLOCKED_HOST_PATTERNS),
            blocked_host_keywords: to_strings(DEFAULT_BLOCKED_HOST_KEYWORDS),
            video_hosts: to_strings(DEFAULT_VIDEO_HOSTS),
            calendar_domains: to_strings(DEFAULT_CALENDAR_DOMAINS),
        }
    }
}

/// Literal host membership.
#[derive(Debug, Clone, Default)]
pub struct HostSet {
    hosts: HashSet<String>,
}

impl HostSet {
    fn new(hosts: &[String]) -> Self {
        Self {
            hosts: hosts.iter().map(|h| normalize_host(h)).collect(),
        }
    }

    /// Whether `host` is in the set
    #[must_use]
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }
}

/// Regular-expression membership over the host text.
#[derive(Debug, Clone, Default)]
pub struct HostPatternSet {
    patterns: Vec<Regex>,
}

impl HostPatternSet {
    fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| Error::InvalidPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// First pattern matching `host`, if any
    #[must_use]
    pub fn find(&self, host: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|re| re.is_match(host))
            .map(Regex::as_str)
    }
}

/// Exact or subdomain-suffix membership.
#[derive(Debug, Clone, Default)]
pub struct DomainSet {
    exact: HashSet<String>,
    /// Stored with the leading dot, e.g. `.calendly.com`
    suffixes: Vec<String>,
}

impl DomainSet {
    fn new(entries: &[String]) -> Self {
        let mut exact = HashSet::new();
        let mut suffixes = Vec::new();
        for entry in entries {
            let entry = normalize_host(entry);
            if let Some(parent) = entry.strip_prefix("*.") {
                suffixes.push(format!(".{parent}"));
            } else {
                exact.insert(entry);
            }
        }
        Self { exact, suffixes }
    }

    /// Whether `host` is an allowed domain
    #[must_use]
    pub fn matches(&self, host: &str) -> bool {
        self.exact.contains(host) || self.suffixes.iter().any(|s| host.ends_with(s.as_str()))
    }
}

/// Lower-case a host and strip IPv6 brackets.
fn normalize_host(host: &str) -> String {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase()
}

/// User-facing messages for the syntax and scheme checks of one URL kind.
struct UrlMessages {
    invalid: &'static str,
    insecure: &'static str,
}

const WEBHOOK: UrlMessages = UrlMessages {
    invalid: "Invalid webhook URL format",
    insecure: "Webhook URL must use HTTPS",
};

const VIDEO: UrlMessages = UrlMessages {
    invalid: "Invalid video URL format",
    insecure: "Video URL must use HTTPS",
};

const CALENDAR: UrlMessages = UrlMessages {
    invalid: "Invalid Calendly URL format",
    insecure: "Calendly URL must use HTTPS",
};

/// Parse `raw` and return the normalized host of an `https` URL.
fn https_host(raw: &str, messages: &UrlMessages) -> std::result::Result<String, ValidationResult> {
    let Ok(parsed) = Url::parse(raw) else {
        return Err(ValidationResult::invalid(messages.invalid));
    };
    if parsed.scheme() != "https" {
        return Err(ValidationResult::invalid(messages.insecure));
    }
    let Some(host) = parsed.host_str() else {
        return Err(ValidationResult::invalid(messages.invalid));
    };
    Ok(normalize_host(host))
}

/// Compiled URL policy.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    blocked_hosts: HostSet,
    blocked_patterns: HostPatternSet,
    blocked_keywords: Vec<String>,
    video_hosts: DomainSet,
    calendar_domains: DomainSet,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self::from_config(&UrlPolicyConfig::default()).expect("built-in host patterns compile")
    }
}

impl UrlPolicy {
    /// Compile a policy from configuration.
    pub fn from_config(config: &UrlPolicyConfig) -> Result<Self> {
        Ok(Self {
            blocked_hosts: HostSet::new(&config.blocked_hosts),
            blocked_patterns: HostPatternSet::new(&config.blocked_host_patterns)?,
            blocked_keywords: config
                .blocked_host_keywords
                .iter()
                .map(|k| k.to_ascii_lowercase())
                .collect(),
            video_hosts: DomainSet::new(&config.video_hosts),
            calendar_domains: DomainSet::new(&config.calendar_domains),
        })
    }

    /// Check a webhook destination against the SSRF deny rules.
    ///
    /// Rules run in order and the first failure wins: URL syntax, `https`
    /// scheme, literal deny hosts, private-range patterns, metadata keywords.
    #[must_use]
    pub fn validate_webhook_url(&self, url: &str) -> ValidationResult {
        let host = match https_host(url, &WEBHOOK) {
            Ok(host) => host,
            Err(result) => return result,
        };

        if self.blocked_hosts.contains(&host) {
            debug!(host = %host, rule = "blocked_host", "Rejected webhook URL");
            return ValidationResult::invalid(
                "Webhook URL cannot point to localhost or internal addresses",
            );
        }

        if let Some(pattern) = self.blocked_patterns.find(&host) {
            debug!(host = %host, rule = "blocked_pattern", pattern, "Rejected webhook URL");
            return ValidationResult::invalid("Webhook URL cannot point to private network addresses");
        }

        if let Some(keyword) = self.blocked_keywords.iter().find(|k| host.contains(k.as_str())) {
            debug!(host = %host, rule = "blocked_keyword", keyword = %keyword, "Rejected webhook URL");
            return ValidationResult::invalid("Webhook URL cannot point to cloud metadata endpoints");
        }

        ValidationResult::ok()
    }

    /// Check a video embed URL. Empty means "no video" and is valid.
    #[must_use]
    pub fn validate_video_embed_url(&self, url: &str) -> ValidationResult {
        if url.is_empty() {
            return ValidationResult::ok();
        }
        let host = match https_host(url, &VIDEO) {
            Ok(host) => host,
            Err(result) => return result,
        };
        if !self.video_hosts.matches(&host) {
            debug!(host = %host, "Rejected video embed host");
            return ValidationResult::invalid(
                "Video URL must be from YouTube, Loom, Vimeo, or Wistia",
            );
        }
        ValidationResult::ok()
    }

    /// Check a calendar booking link. Empty means "not configured" and is valid.
    #[must_use]
    pub fn validate_calendly_url(&self, url: &str) -> ValidationResult {
        if url.is_empty() {
            return ValidationResult::ok();
        }
        let host = match https_host(url, &CALENDAR) {
            Ok(host) => host,
            Err(result) => return result,
        };
        if !self.calendar_domains.matches(&host) {
            debug!(host = %host, "Rejected calendar link host");
            return ValidationResult::invalid("URL must be a Calendly link");
        }
        ValidationResult::ok()
    }
}

static DEFAULT_POLICY: LazyLock<UrlPolicy> = LazyLock::new(UrlPolicy::default);

/// [`UrlPolicy::validate_webhook_url`] with the built-in lists.
#[must_use]
pub fn validate_webhook_url(url: &str) -> ValidationResult {
    DEFAULT_POLICY.validate_webhook_url(url)
}

/// [`UrlPolicy::validate_video_embed_url`] with the built-in lists.
#[must_use]
pub fn validate_video_embed_url(url: &str) -> ValidationResult {
    DEFAULT_POLICY.validate_video_embed_url(url)
}

/// [`UrlPolicy::validate_calendly_url`] with the built-in lists.
#[must_use]
pub fn validate_calendly_url(url: &str) -> ValidationResult {
    DEFAULT_POLICY.validate_calendly_url(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── webhook ───────────────────────────────────────────────────────

    #[test]
    fn webhook_accepts_public_https() {
        assert!(validate_webhook_url("https://api.example.com/webhook").valid);
        assert!(validate_webhook_url("https://hooks.zapier.com/hooks/catch/1/abc").valid);
    }

    #[test]
    fn webhook_rejects_unparseable() {
        let result = validate_webhook_url("not a url");
        assert!(!result.valid);
        assert_eq!(result.error(), Some("Invalid webhook URL format"));
    }

    #[test]
    fn webhook_requires_https() {
        let result = validate_webhook_url("http://api.example.com/webhook");
        assert!(!result.valid);
        assert!(result.error().unwrap().contains("HTTPS"));
    }

    #[test]
    fn webhook_rejects_literal_hosts() {
        for url in [
            "https://localhost/x",
            "https://LOCALHOST/x",
            "https://127.0.0.1/x",
            "https://0.0.0.0/x",
            "https://[::1]/x",
            "https://169.254.169.254/latest/meta-data",
            "https://100.100.100.200/x",
        ] {
            assert!(!validate_webhook_url(url).valid, "{url} should be rejected");
        }
    }

    #[test]
    fn webhook_rejects_private_ranges() {
        for url in [
            "https://10.0.0.1/x",
            "https://172.16.0.1/x",
            "https://172.31.255.255/x",
            "https://192.168.1.1/x",
            "https://127.1.2.3/x",
            "https://169.254.10.10/x",
            "https://[fc00::1]/x",
            "https://[fe80::1]/x",
        ] {
            let result = validate_webhook_url(url);
            assert!(!result.valid, "{url} should be rejected");
        }
    }

    #[test]
    fn webhook_allows_public_neighbours_of_private_ranges() {
        assert!(validate_webhook_url("https://172.15.0.1/x").valid);
        assert!(validate_webhook_url("https://172.32.0.1/x").valid);
        assert!(validate_webhook_url("https://192.169.0.1/x").valid);
    }

    #[test]
    fn webhook_rejects_metadata_hosts() {
        let result = validate_webhook_url("https://metadata.google.internal/computeMetadata/v1");
        assert!(!result.valid);
        let result = validate_webhook_url("https://instance-data.ec2.internal/x");
        assert!(!result.valid);
        assert!(result.error().unwrap().contains("metadata"));
    }

    #[test]
    fn webhook_first_failure_wins() {
        // Both plain http and a private host: scheme is reported.
        let result = validate_webhook_url("http://10.0.0.1/x");
        assert!(result.error().unwrap().contains("HTTPS"));
    }

    #[test]
    fn webhook_catches_normalized_ipv4_spellings() {
        // The URL parser canonicalizes hex/short IPv4 forms before matching.
        assert!(!validate_webhook_url("https://0x7f000001/x").valid);
        assert!(!validate_webhook_url("https://10.1/x").valid);
    }

    // ── video ─────────────────────────────────────────────────────────

    #[test]
    fn video_accepts_known_hosts() {
        for url in [
            "https://www.youtube.com/embed/abc123",
            "https://youtu.be/abc123",
            "https://www.loom.com/embed/xyz",
            "https://player.vimeo.com/video/1",
            "https://fast.wistia.net/embed/iframe/abc",
        ] {
            assert!(validate_video_embed_url(url).valid, "{url} should pass");
        }
    }

    #[test]
    fn video_empty_is_valid() {
        assert!(validate_video_embed_url("").valid);
    }

    #[test]
    fn video_rejects_other_hosts() {
        assert!(!validate_video_embed_url("https://evil.com/xss.html").valid);
        assert!(!validate_video_embed_url("https://youtube.com.evil.com/embed").valid);
        assert!(!validate_video_embed_url("https://m.youtube.com/embed/abc").valid);
    }

    #[test]
    fn video_requires_https() {
        let result = validate_video_embed_url("http://www.youtube.com/embed/abc");
        assert_eq!(result.error(), Some("Video URL must use HTTPS"));
    }

    #[test]
    fn video_rejects_garbage() {
        assert_eq!(
            validate_video_embed_url("javascript-ish").error(),
            Some("Invalid video URL format")
        );
    }

    // ── calendar ──────────────────────────────────────────────────────

    #[test]
    fn calendar_accepts_apex_and_subdomains() {
        assert!(validate_calendly_url("https://calendly.com/user/meeting").valid);
        assert!(validate_calendly_url("https://acme.calendly.com/team").valid);
    }

    #[test]
    fn calendar_rejects_lookalikes() {
        assert!(!validate_calendly_url("https://fakecalendly.com/user").valid);
        assert!(!validate_calendly_url("https://calendly.com.evil.io/user").valid);
    }

    #[test]
    fn calendar_empty_is_valid() {
        assert!(validate_calendly_url("").valid);
    }

    #[test]
    fn calendar_requires_https() {
        let result = validate_calendly_url("http://calendly.com/user");
        assert_eq!(result.error(), Some("Calendly URL must use HTTPS"));
    }

    // ── configuration ─────────────────────────────────────────────────

    #[test]
    fn configured_lists_extend_policy() {
        let mut config = UrlPolicyConfig::default();
        config.blocked_hosts.push("internal.acme.dev".to_string());
        config.video_hosts.push("*.wistia.com".to_string());
        let policy = UrlPolicy::from_config(&config).unwrap();

        assert!(!policy.validate_webhook_url("https://internal.acme.dev/hook").valid);
        assert!(policy.validate_video_embed_url("https://acme.wistia.com/medias/1").valid);
        assert!(policy.validate_video_embed_url("https://wistia.com/medias/1").valid);
    }

    #[test]
    fn invalid_pattern_is_rejected_at_compile_time() {
        let config = UrlPolicyConfig {
            blocked_host_patterns: vec!["^(10\\.".to_string()],
            ..UrlPolicyConfig::default()
        };
        let err = UrlPolicy::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn domain_set_wildcard_excludes_apex() {
        let set = DomainSet::new(&["*.example.com".to_string()]);
        assert!(set.matches("a.example.com"));
        assert!(!set.matches("example.com"));
        assert!(!set.matches("badexample.com"));
    }

    #[test]
    fn pattern_set_reports_matching_pattern() {
        let set = HostPatternSet::new(&to_strings(DEFAULT_BLOCKED_HOST_PATTERNS)).unwrap();
        assert_eq!(set.find("192.168.0.1"), Some(r"^192\.168\."));
        assert_eq!(set.find("example.com"), None);
    }
}
