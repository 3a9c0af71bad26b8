//! # Rate Limiting
//!
//! Fixed-window counters keyed by an arbitrary source (remote IP, peer
//! identity). A policy pairs several windows; an action is approved only if
//! every window still has capacity, and only then is it counted.
//!
//! Keys are kept in a bounded LRU table. Keys idle for longer than the
//! largest window are reclaimed on access; when the table is still full the
//! least recently used key is dropped.

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Maximum number of keys tracked per limiter.
pub const RATE_LIMITER_CAPACITY: usize = 65_535;

/// `limit` actions per `window_millis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    /// Allowed actions per window
    pub limit: u32,
    /// Window length in milliseconds
    pub window_millis: u64,
}

impl WindowLimit {
    /// `limit` per second.
    pub const fn per_second(limit: u32) -> Self {
        Self {
            limit,
            window_millis: 1_000,
        }
    }

    /// `limit` per minute.
    pub const fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window_millis: 60_000,
        }
    }
}

/// Set of windows that must all approve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    windows: Vec<WindowLimit>,
}

impl RateLimitPolicy {
    /// Custom policy.
    pub fn new(windows: Vec<WindowLimit>) -> Self {
        Self { windows }
    }

    /// New sessions per remote IP: 10/s and 100/min.
    pub fn connect() -> Self {
        Self::new(vec![WindowLimit::per_second(10), WindowLimit::per_minute(100)])
    }

    /// Incoming spreads per peer: 100/s and 2000/min.
    pub fn knowledge_spread() -> Self {
        Self::new(vec![
            WindowLimit::per_second(100),
            WindowLimit::per_minute(2000),
        ])
    }

    fn longest_window(&self) -> u64 {
        self.windows
            .iter()
            .map(|w| w.window_millis)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy)]
struct FixedWindow {
    count: u32,
    window_start: u64,
}

impl FixedWindow {
    fn roll(&mut self, limit: &WindowLimit, now: u64) {
        if now >= self.window_start.saturating_add(limit.window_millis) {
            self.window_start = now;
            self.count = 0;
        }
    }
}

#[derive(Debug)]
struct LimiterRecord {
    windows: Vec<FixedWindow>,
    last_access: u64,
}

/// Bounded table of per-key fixed-window limiters.
#[derive(Debug)]
pub struct RateLimiterCache<K: Hash + Eq> {
    policy: RateLimitPolicy,
    records: Mutex<LruCache<K, LimiterRecord>>,
}

impl<K: Hash + Eq + Clone> RateLimiterCache<K> {
    /// Limiter with the default key capacity.
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_capacity(policy, RATE_LIMITER_CAPACITY)
    }

    /// Limiter tracking at most `capacity` keys.
    pub fn with_capacity(policy: RateLimitPolicy, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            policy,
            records: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Count one action by `key` at `now` (epoch millis) if every window allows it.
    pub fn try_acquire(&self, key: &K, now: u64) -> bool {
        let mut records = self.records.lock();
        self.reclaim_idle(&mut records, now);

        let windows = self.policy.windows.len();
        let record = records.get_or_insert_mut(key.clone(), || LimiterRecord {
            windows: vec![
                FixedWindow {
                    count: 0,
                    window_start: now,
                };
                windows
            ],
            last_access: now,
        });
        record.last_access = now;

        for (window, limit) in record.windows.iter_mut().zip(&self.policy.windows) {
            window.roll(limit, now);
        }
        let allowed = record
            .windows
            .iter()
            .zip(&self.policy.windows)
            .all(|(window, limit)| window.count < limit.limit);

        if allowed {
            for window in &mut record.windows {
                window.count += 1;
            }
        }
        allowed
    }

    /// Number of tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether `key` currently has a record.
    pub fn is_tracked(&self, key: &K) -> bool {
        self.records.lock().contains(key)
    }

    // least recently used keys sit at the cold end, so the sweep stops at
    // the first key still inside the longest window
    fn reclaim_idle(&self, records: &mut LruCache<K, LimiterRecord>, now: u64) {
        let idle_after = self.policy.longest_window();
        while let Some((_, record)) = records.peek_lru() {
            if now.saturating_sub(record.last_access) <= idle_after {
                break;
            }
            records.pop_lru();
        }
    }
}
