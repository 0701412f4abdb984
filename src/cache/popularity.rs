//! In-memory query traffic counters.
//!
//! Counts every cache event for a query — hit, miss, and set all increment
//! identically, so the counter tracks *traffic*, not hit rate. The map is
//! bounded: once it grows past its configured capacity a sweep evicts the
//! least-recently-accessed half. Counters are process-local and reset on
//! restart; losing them only resets TTL escalation, never correctness.

use crate::cache::key::normalize_query;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

struct Counter {
    count: AtomicU64,
    /// Logical access tick, used for eviction ordering. A logical clock
    /// keeps recency ordering exact even when accesses land within the
    /// same wall-clock instant.
    last_accessed: AtomicU64,
}

pub struct PopularityTracker {
    entries: DashMap<String, Counter>,
    capacity: usize,
    clock: AtomicU64,
    /// Claimed while a sweep runs so concurrent writers don't all sweep.
    sweeping: AtomicBool,
}

impl PopularityTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            sweeping: AtomicBool::new(false),
        }
    }

    /// Record one traffic event for a query and return the new count.
    pub fn record(&self, query: &str) -> u64 {
        let key = normalize_query(query);
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);

        let count = {
            let counter = self.entries.entry(key).or_insert_with(|| Counter {
                count: AtomicU64::new(0),
                last_accessed: AtomicU64::new(tick),
            });
            counter.last_accessed.store(tick, Ordering::Relaxed);
            counter.count.fetch_add(1, Ordering::Relaxed) + 1
        };

        if self.entries.len() > self.capacity {
            self.sweep();
        }
        count
    }

    /// Current traffic count for a query; 0 if unseen.
    pub fn count(&self, query: &str) -> u64 {
        let key = normalize_query(query);
        self.entries
            .get(&key)
            .map(|counter| counter.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Number of distinct queries currently tracked.
    pub fn tracked(&self) -> usize {
        self.entries.len()
    }

    /// Evict the least-recently-accessed entries down to half capacity.
    fn sweep(&self) {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let target = self.capacity / 2;
        let mut by_age: Vec<(String, u64)> = self
            .entries
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().last_accessed.load(Ordering::Relaxed),
                )
            })
            .collect();

        if by_age.len() > target {
            by_age.sort_by_key(|(_, tick)| *tick);
            let evict = by_age.len() - target;
            for (key, _) in by_age.into_iter().take(evict) {
                self.entries.remove(&key);
            }
            debug!(evicted = evict, remaining = self.entries.len(), "popularity map swept");
        }

        self.sweeping.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_accumulate_per_normalized_query() {
        let tracker = PopularityTracker::new(100);
        assert_eq!(tracker.count("tuition"), 0);
        tracker.record("Tuition");
        tracker.record("  tuition ");
        assert_eq!(tracker.count("tuition"), 2);
        assert_eq!(tracker.tracked(), 1);
    }

    #[test]
    fn sweep_bounds_the_map() {
        let tracker = PopularityTracker::new(10);
        for i in 0..50 {
            tracker.record(&format!("query {i}"));
        }
        assert!(tracker.tracked() <= 11, "tracked {} queries", tracker.tracked());
    }

    #[test]
    fn sweep_keeps_recently_accessed_entries() {
        let tracker = PopularityTracker::new(4);
        for i in 0..4 {
            tracker.record(&format!("old {i}"));
        }
        // Refresh one old entry, then overflow the map by one.
        tracker.record("old 3");
        tracker.record("new 0");

        // The sweep keeps the two most recently accessed entries.
        assert!(tracker.count("old 3") > 0);
        assert!(tracker.count("new 0") > 0);
        assert_eq!(tracker.count("old 0"), 0);
        assert_eq!(tracker.tracked(), 2);
    }

    #[tokio::test]
    async fn concurrent_increments_do_not_lose_counts() {
        let tracker = Arc::new(PopularityTracker::new(1000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    tracker.record("popular query");
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(tracker.count("popular query"), 800);
    }
}
