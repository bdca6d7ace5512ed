//! Process-wide response cache keyed by the exact upstream request URL.
//!
//! One instance lives for the whole process, constructed at startup and
//! injected into the fetch client. Entries are replaced atomically per
//! key; a periodic sweep drops entries older than the cache window so the
//! map never grows without bound.

use dashmap::DashMap;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// One cached upstream payload with its fetch time
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Value,
    pub fetched_at: Instant,
}

impl CacheEntry {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            fetched_at: Instant::now(),
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }

    /// Fresh while strictly younger than the window
    pub fn is_fresh(&self, now: Instant, window: Duration) -> bool {
        self.age(now) < window
    }
}

#[derive(Debug, Default)]
struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_serves: AtomicU64,
    evictions: AtomicU64,
}

/// Counter snapshot for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_serves: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// In-memory cache shared by every session the process serves.
/// `DashMap` gives atomic per-key replacement and lets the sweep run
/// without blocking concurrent readers.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    window: Duration,
    metrics: CacheMetrics,
}

impl ResponseCache {
    pub fn new(window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            window,
            metrics: CacheMetrics::default(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    /// Overwrites any prior entry for the key
    pub fn put(&self, key: &str, payload: Value) {
        self.entries.insert(key.to_string(), CacheEntry::new(payload));
    }

    pub fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        entry.is_fresh(now, self.window)
    }

    /// Drops every entry older than the window; returns how many went
    pub fn evict_stale(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now, self.window));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.metrics.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            debug!("Cache sweep removed {} stale entries", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn record_hit(&self) {
        self.metrics.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_serve(&self) {
        self.metrics.stale_serves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.metrics.hits.load(Ordering::Relaxed),
            misses: self.metrics.misses.load(Ordering::Relaxed),
            stale_serves: self.metrics.stale_serves.load(Ordering::Relaxed),
            evictions: self.metrics.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const WINDOW: Duration = Duration::from_millis(300_000);

    #[test]
    fn freshness_boundary_sits_at_the_window() {
        let entry = CacheEntry::new(json!({"ok": true}));
        let just_inside = entry.fetched_at + Duration::from_millis(299_999);
        let just_outside = entry.fetched_at + Duration::from_millis(300_001);
        assert!(entry.is_fresh(just_inside, WINDOW));
        assert!(!entry.is_fresh(just_outside, WINDOW));
        assert!(!entry.is_fresh(entry.fetched_at + WINDOW, WINDOW));
    }

    #[test]
    fn put_replaces_prior_entry() {
        let cache = ResponseCache::new(WINDOW);
        cache.put("k", json!({"v": 1}));
        cache.put("k", json!({"v": 2}));
        let entry = cache.get("k").unwrap();
        assert_eq!(entry.payload, json!({"v": 2}));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn sweep_removes_only_stale_entries() {
        let cache = ResponseCache::new(WINDOW);
        cache.put("a", json!(1));
        cache.put("b", json!(2));
        assert_eq!(cache.evict_stale(Instant::now()), 0);
        assert_eq!(cache.len(), 2);

        let past_window = Instant::now() + WINDOW + Duration::from_secs(1);
        assert_eq!(cache.evict_stale(past_window), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let cache = ResponseCache::new(WINDOW);
        cache.record_miss();
        cache.record_hit();
        cache.record_hit();
        cache.record_stale_serve();
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.stale_serves, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }
}
