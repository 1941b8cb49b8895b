//! Fixed-window rate limiting keyed by caller-chosen strings.
//!
//! Keys are usually `"{feature}:{client}"`, e.g. `lead_capture:203.0.113.9`.
//! The first request for a key opens a window of `window` length; up to
//! `max_requests` requests are allowed in it and the rest are denied (and
//! not counted) until the window ends.
//!
//! Counters live in a [`RateLimitStore`]. The default [`InMemoryStore`] is
//! per-process: several instances behind a load balancer each enforce their
//! own limit.

mod clock;
pub mod middleware;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{InMemoryStore, RateLimitRecord, RateLimitStore};

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{RateLimitConfig, RateLimiterConfig};

/// Client identity used when no forwarding header is present.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Header carrying the client address chain.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

pub(crate) fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// Epoch milliseconds at which the window ends
    pub reset_time: u64,
}

impl RateLimitDecision {
    /// Time until the window ends, as seen at `now_ms`.
    #[must_use]
    pub fn retry_after(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.reset_time.saturating_sub(now_ms))
    }
}

/// Read-only header lookup, so key derivation works with any request type.
pub trait HeaderSource {
    /// Value of header `name` (case-insensitive), if present and textual.
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }
}

impl<S: BuildHasher> HeaderSource for HashMap<String, String, S> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name)
            .or_else(|| {
                self.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }
}

/// Client identity from the first `x-forwarded-for` entry.
///
/// The header is taken at face value. It is only trustworthy when a proxy in
/// front of the service overwrites it.
pub fn client_identity(headers: &impl HeaderSource) -> String {
    headers
        .header(FORWARDED_FOR_HEADER)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Build the `"{prefix}:{client}"` key for a request.
pub fn rate_limit_key(headers: &impl HeaderSource, prefix: &str) -> String {
    format!("{prefix}:{}", client_identity(headers))
}

/// Keyed fixed-window rate limiter.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    config: RateLimiterConfig,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked_keys", &self.store.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter with an in-memory store and the system clock.
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        let store = Arc::new(InMemoryStore::with_max_entries(config.max_entries));
        Self::with_parts(config, store, Arc::new(SystemClock))
    }

    /// Create a limiter with an explicit store and clock.
    #[must_use]
    pub fn with_parts(
        config: RateLimiterConfig,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Count a request for `key` against `limit`.
    pub fn check(&self, key: &str, limit: &RateLimitConfig) -> RateLimitDecision {
        let now = self.clock.now_millis();
        let decision = self
            .store
            .hit(key, now, limit.window_millis(), limit.max_requests);
        if !decision.allowed {
            debug!(
                key,
                retry_after_ms = decision.reset_time.saturating_sub(now),
                "Rate limit exceeded"
            );
        }
        decision
    }

    /// Limit configured for `policy`, or the default limit.
    #[must_use]
    pub fn limit_for(&self, policy: &str) -> &RateLimitConfig {
        self.config
            .policies
            .get(policy)
            .unwrap_or(&self.config.default_limit)
    }

    /// Count a request from `client` under the named policy.
    pub fn check_policy(&self, policy: &str, client: &str) -> RateLimitDecision {
        let key = format!("{policy}:{client}");
        self.check(&key, self.limit_for(policy))
    }

    /// Current time according to this limiter's clock.
    #[must_use]
    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Drop windows that have ended.
    pub fn evict_expired(&self) -> usize {
        self.store.evict_expired(self.clock.now_millis())
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Start the background sweeper at the configured `sweep_interval`.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        shutdown: tokio::sync::broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let interval = self.config.sweep_interval;
        spawn_sweeper(self, interval, shutdown)
    }
}

/// Spawn a background task that drops ended windows every `interval`.
///
/// The task exits when `shutdown` fires or its sender is dropped.
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    limiter.evict_expired();
                }
                _ = shutdown.recv() => {
                    debug!("Rate limit sweeper shutting down");
                    break;
                }
            }
        }
    })
}
