//! Configuration management

use std::{collections::HashMap, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::security::{UrlPolicy, UrlPolicyConfig};
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Rate limiter configuration
    pub rate_limit: RateLimiterConfig,
    /// Deny and allow lists for user-supplied URLs
    pub url_policy: UrlPolicyConfig,
}

impl Config {
    /// Load configuration from an optional YAML file, then
    /// `FUNNEL_GUARD_`-prefixed environment variables (`__` separates
    /// nesting levels, e.g. `FUNNEL_GUARD_RATE_LIMIT__MAX_ENTRIES`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("FUNNEL_GUARD_").split("__"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that can never admit a request and host patterns that
    /// do not compile.
    pub fn validate(&self) -> Result<()> {
        self.rate_limit.default_limit.validate("default_limit")?;
        for (name, limit) in &self.rate_limit.policies {
            limit.validate(name)?;
        }
        if self.rate_limit.sweep_interval.is_zero() {
            return Err(Error::Config("sweep_interval must be non-zero".to_string()));
        }
        UrlPolicy::from_config(&self.url_policy)?;
        Ok(())
    }
}

/// A single fixed-window limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Requests allowed per window
    pub max_requests: u32,
}

impl RateLimitConfig {
    /// Create a limit of `max_requests` per `window`.
    #[must_use]
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    /// Window length in milliseconds
    #[must_use]
    pub fn window_millis(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.window_millis() == 0 {
            return Err(Error::Config(format!(
                "rate limit '{name}': window must be at least 1ms"
            )));
        }
        if self.max_requests == 0 {
            return Err(Error::Config(format!(
                "rate limit '{name}': max_requests must be at least 1"
            )));
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 60)
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Limit applied to policies without their own entry
    pub default_limit: RateLimitConfig,
    /// Named limits, e.g. `lead_capture`, `ai_generation`
    pub policies: HashMap<String, RateLimitConfig>,
    /// Maximum tracked keys in the in-memory store (0 = unbounded)
    pub max_entries: usize,
    /// How often the background sweeper drops ended windows
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            default_limit: RateLimitConfig::default(),
            policies: HashMap::new(),
            max_entries: 100_000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to a human-readable string (`"30s"`, or `"250ms"`
    /// when not a whole number of seconds)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize a duration string (`"100ms"`, `"30s"`, `"5m"`, `"1h"`;
    /// bare numbers are seconds)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();

        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            scaled_secs(mins, 60)
        } else if let Some(hours) = s.strip_suffix('h') {
            scaled_secs(hours, 3600)
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }

    fn scaled_secs<E: serde::de::Error>(value: &str, unit_secs: u64) -> Result<Duration, E> {
        let n = value.parse::<u64>().map_err(E::custom)?;
        n.checked_mul(unit_secs)
            .map(Duration::from_secs)
            .ok_or_else(|| E::custom(format!("duration '{value}' is too large")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn policies_deserialized_from_yaml() {
        let yaml = r#"
rate_limit:
  default_limit:
    window: "1m"
    max_requests: 30
  policies:
    lead_capture:
      window: "10m"
      max_requests: 5
    ai_generation:
      window: "500ms"
      max_requests: 1
  max_entries: 1000
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.rate_limit.default_limit.window, Duration::from_secs(60));
        assert_eq!(config.rate_limit.policies["lead_capture"].max_requests, 5);
        assert_eq!(
            config.rate_limit.policies["ai_generation"].window_millis(),
            500
        );
        assert_eq!(config.rate_limit.max_entries, 1000);
        // Untouched sections keep their defaults.
        assert_eq!(config.rate_limit.sweep_interval, Duration::from_secs(60));
        assert!(config.url_policy.video_hosts.contains(&"youtu.be".to_string()));
    }

    #[test]
    fn duration_round_trips_through_strings() {
        let limit = RateLimitConfig::new(Duration::from_millis(1500), 3);
        let yaml = serde_yaml::to_string(&limit).unwrap();
        assert!(yaml.contains("1500ms"));
        let back: RateLimitConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, limit);
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let err = serde_yaml::from_str::<RateLimitConfig>(
            "window: \"307445734561825861m\"\nmax_requests: 1\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("too large"));

        let err = serde_yaml::from_str::<RateLimitConfig>(
            "window: \"18446744073709551615h\"\nmax_requests: 1\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("too large"));

        let ok: RateLimitConfig =
            serde_yaml::from_str("window: \"2h\"\nmax_requests: 1\n").unwrap();
        assert_eq!(ok.window, Duration::from_secs(7200));
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut config = Config::default();
        config.rate_limit.policies.insert(
            "broken".to_string(),
            RateLimitConfig::new(Duration::from_secs(60), 0),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("broken"));

        let mut config = Config::default();
        config.rate_limit.default_limit.window = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_host_pattern_is_rejected() {
        let mut config = Config::default();
        config.url_policy.blocked_host_patterns.push("[".to_string());
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn load_reads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funnel-guard.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "url_policy:").unwrap();
        writeln!(f, "  calendar_domains: [\"calendly.com\", \"cal.com\"]").unwrap();
        drop(f);

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.url_policy.calendar_domains, vec!["calendly.com", "cal.com"]);
        assert!(!config.url_policy.blocked_hosts.is_empty());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/funnel-guard.yaml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
