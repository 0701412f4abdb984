//! Process-wide counters for cache, prefetch, probe, and orchestrator
//! activity.
//!
//! Counters are plain atomics — recording can never fail, block, or
//! propagate into the data path. Snapshots are served by `/api/metrics`
//! for offline analysis of which retrieval path actually serves traffic.

use crate::cache::key::KeyKind;
use crate::cache::store::{StoreEvent, StoreHook};
use crate::client::orchestrator::Branch;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    search_hits: AtomicU64,
    search_misses: AtomicU64,
    tab_hits: AtomicU64,
    tab_misses: AtomicU64,
    suggestion_hits: AtomicU64,
    suggestion_misses: AtomicU64,
    sets: AtomicU64,
    set_failures: AtomicU64,
    store_errors: AtomicU64,

    prefetch_scheduled: AtomicU64,
    prefetch_skipped: AtomicU64,
    prefetch_completed: AtomicU64,
    prefetch_failed: AtomicU64,

    probe_hits: AtomicU64,
    probe_misses: AtomicU64,
    probe_timeouts: AtomicU64,

    served_pre_render: AtomicU64,
    served_cache_first: AtomicU64,
    served_standard: AtomicU64,
    superseded: AtomicU64,
}

/// The outcome of one prefetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    Scheduled,
    SkippedCached,
    Completed,
    Failed,
}

/// The outcome of one cache-existence probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Hit,
    Miss,
    TimedOut,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_store(&self, event: StoreEvent) {
        let counter = match event {
            StoreEvent::Hit(KeyKind::Search) => &self.search_hits,
            StoreEvent::Hit(KeyKind::Tab) => &self.tab_hits,
            StoreEvent::Hit(KeyKind::Suggestion) => &self.suggestion_hits,
            StoreEvent::Miss(KeyKind::Search) => &self.search_misses,
            StoreEvent::Miss(KeyKind::Tab) => &self.tab_misses,
            StoreEvent::Miss(KeyKind::Suggestion) => &self.suggestion_misses,
            StoreEvent::Set(_) => &self.sets,
            StoreEvent::SetFailed(_) => &self.set_failures,
            StoreEvent::Error => &self.store_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Build the store-side observer callback.
    pub fn store_hook(self: &Arc<Self>) -> StoreHook {
        let metrics = self.clone();
        Arc::new(move |event| metrics.record_store(event))
    }

    pub fn record_prefetch(&self, outcome: PrefetchOutcome) {
        let counter = match outcome {
            PrefetchOutcome::Scheduled => &self.prefetch_scheduled,
            PrefetchOutcome::SkippedCached => &self.prefetch_skipped,
            PrefetchOutcome::Completed => &self.prefetch_completed,
            PrefetchOutcome::Failed => &self.prefetch_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_probe(&self, outcome: ProbeOutcome) {
        let counter = match outcome {
            ProbeOutcome::Hit => &self.probe_hits,
            ProbeOutcome::Miss => &self.probe_misses,
            ProbeOutcome::TimedOut => &self.probe_timeouts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record which branch served a submission, or that it was superseded.
    pub fn record_branch(&self, branch: Branch, applied: bool) {
        if !applied {
            self.superseded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let counter = match branch {
            Branch::PreRender => &self.served_pre_render,
            Branch::CacheFirst => &self.served_cache_first,
            Branch::Standard => &self.served_standard,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            cache: CacheSnapshot {
                search_hits: load(&self.search_hits),
                search_misses: load(&self.search_misses),
                tab_hits: load(&self.tab_hits),
                tab_misses: load(&self.tab_misses),
                suggestion_hits: load(&self.suggestion_hits),
                suggestion_misses: load(&self.suggestion_misses),
                sets: load(&self.sets),
                set_failures: load(&self.set_failures),
                store_errors: load(&self.store_errors),
            },
            prefetch: PrefetchSnapshot {
                scheduled: load(&self.prefetch_scheduled),
                skipped_cached: load(&self.prefetch_skipped),
                completed: load(&self.prefetch_completed),
                failed: load(&self.prefetch_failed),
            },
            probe: ProbeSnapshot {
                hits: load(&self.probe_hits),
                misses: load(&self.probe_misses),
                timeouts: load(&self.probe_timeouts),
            },
            orchestrator: OrchestratorSnapshot {
                pre_render: load(&self.served_pre_render),
                cache_first: load(&self.served_cache_first),
                standard: load(&self.served_standard),
                superseded: load(&self.superseded),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub cache: CacheSnapshot,
    pub prefetch: PrefetchSnapshot,
    pub probe: ProbeSnapshot,
    pub orchestrator: OrchestratorSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub search_hits: u64,
    pub search_misses: u64,
    pub tab_hits: u64,
    pub tab_misses: u64,
    pub suggestion_hits: u64,
    pub suggestion_misses: u64,
    pub sets: u64,
    pub set_failures: u64,
    pub store_errors: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefetchSnapshot {
    pub scheduled: u64,
    pub skipped_cached: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub timeouts: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorSnapshot {
    pub pre_render: u64,
    pub cache_first: u64,
    pub standard: u64,
    pub superseded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_events_land_in_their_category() {
        let metrics = Metrics::new();
        let hook = metrics.store_hook();
        hook(StoreEvent::Hit(KeyKind::Search));
        hook(StoreEvent::Miss(KeyKind::Tab));
        hook(StoreEvent::Set(KeyKind::Search));
        hook(StoreEvent::Error);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache.search_hits, 1);
        assert_eq!(snapshot.cache.tab_misses, 1);
        assert_eq!(snapshot.cache.sets, 1);
        assert_eq!(snapshot.cache.store_errors, 1);
        assert_eq!(snapshot.cache.search_misses, 0);
    }

    #[test]
    fn branch_telemetry_distinguishes_superseded() {
        let metrics = Metrics::new();
        metrics.record_branch(Branch::Standard, true);
        metrics.record_branch(Branch::CacheFirst, false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.orchestrator.standard, 1);
        assert_eq!(snapshot.orchestrator.cache_first, 0);
        assert_eq!(snapshot.orchestrator.superseded, 1);
    }
}
