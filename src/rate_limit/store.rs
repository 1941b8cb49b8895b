//! Storage for fixed-window rate-limit records.
//!
//! [`RateLimitStore`] is the seam for a shared backend (e.g. a TTL key-value
//! cache) when several instances must share counters. [`InMemoryStore`]
//! keeps records in this process only.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use super::RateLimitDecision;

/// One key's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    /// Requests counted in the current window
    pub count: u32,
    /// Epoch milliseconds at which the window ends
    pub reset_time: u64,
}

impl RateLimitRecord {
    /// Whether the window has ended at `now_ms`.
    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.reset_time
    }
}

/// Backend holding rate-limit records.
///
/// `hit` must update a key atomically: concurrent hits on one key may not
/// both observe the same count.
pub trait RateLimitStore: Send + Sync {
    /// Count a request for `key` at `now_ms` and decide whether it is allowed.
    fn hit(&self, key: &str, now_ms: u64, window_ms: u64, max_requests: u32) -> RateLimitDecision;

    /// Current record for `key`, if any.
    fn get(&self, key: &str) -> Option<RateLimitRecord>;

    /// Drop records whose window ended. Returns how many were dropped.
    fn evict_expired(&self, now_ms: u64) -> usize;

    /// Number of tracked keys.
    fn len(&self) -> usize;

    /// Whether no keys are tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Full sweeps triggered from the request path run at most this often.
const FULL_SWEEP_BACKOFF_MS: u64 = 1_000;

/// Entries inspected when evicting a live window at the cap.
const EVICTION_SAMPLE: usize = 8;

/// Process-local store on a `DashMap`.
///
/// With a non-zero `max_entries`, inserting a new key at the cap frees one
/// slot. Expired records are swept first, at most once a second; otherwise
/// the soonest-ending window among a small sample of entries is dropped.
/// A caller rotating keys costs constant work per request, not a table scan.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, RateLimitRecord>,
    max_entries: usize,
    /// Earliest time the request path may run a full sweep again
    next_full_sweep: AtomicU64,
}

impl InMemoryStore {
    /// Create an unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding at most `max_entries` keys (0 = unbounded).
    #[must_use]
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    fn make_room(&self, now_ms: u64) {
        let due = self.next_full_sweep.load(Ordering::Relaxed);
        if now_ms >= due
            && self
                .next_full_sweep
                .compare_exchange(
                    due,
                    now_ms.saturating_add(FULL_SWEEP_BACKOFF_MS),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            && self.evict_expired(now_ms) > 0
            && self.entries.len() < self.max_entries
        {
            return;
        }

        // The iterator holds shard read locks; release them before removing.
        let victim = self
            .entries
            .iter()
            .take(EVICTION_SAMPLE)
            .min_by_key(|e| e.value().reset_time)
            .map(|e| e.key().clone());

        if let Some(key) = victim {
            self.entries.remove(&key);
            debug!(key = %key, max_entries = self.max_entries, "Rate limit table full, evicted window");
        }
    }
}

impl RateLimitStore for InMemoryStore {
    fn hit(&self, key: &str, now_ms: u64, window_ms: u64, max_requests: u32) -> RateLimitDecision {
        if self.max_entries > 0
            && self.entries.len() >= self.max_entries
            && !self.entries.contains_key(key)
        {
            self.make_room(now_ms);
        }

        // A fresh record has reset_time 0 and so starts a new window below.
        let mut record = self
            .entries
            .entry(key.to_string())
            .or_insert(RateLimitRecord {
                count: 0,
                reset_time: 0,
            });

        if record.is_expired(now_ms) {
            record.count = 1;
            record.reset_time = now_ms.saturating_add(window_ms);
            return RateLimitDecision {
                allowed: true,
                remaining: max_requests.saturating_sub(1),
                reset_time: record.reset_time,
            };
        }

        if record.count >= max_requests {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_time: record.reset_time,
            };
        }

        record.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: max_requests - record.count,
            reset_time: record.reset_time,
        }
    }

    fn get(&self, key: &str) -> Option<RateLimitRecord> {
        self.entries.get(key).map(|r| *r.value())
    }

    fn evict_expired(&self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, record| !record.is_expired(now_ms));
        let count = before.saturating_sub(self.entries.len());
        if count > 0 {
            debug!(count, "Evicted expired rate limit windows");
        }
        count
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
