//! Fire-and-forget cache warming.
//!
//! A prefetch is triggered ahead of submission (typing, focus) and must be
//! invisible to the user: the scheduling call returns immediately, origin
//! failures are swallowed, and the only observable effect is a warmer cache
//! plus metrics. Concurrent prefetches for one key are safe to overlap —
//! entries are immutable-by-replacement, so the last write simply wins.

use crate::cache::entry::{CacheEntry, PayloadFormat};
use crate::cache::key::{KeyKind, search_key};
use crate::cache::popularity::PopularityTracker;
use crate::cache::store::CacheStore;
use crate::cache::ttl::TtlPolicy;
use crate::metrics::{Metrics, PrefetchOutcome};
use crate::origin::{OriginClient, OriginRequest};
use crate::utils::fmt_duration;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One scheduled warm-up.
#[derive(Debug, Clone)]
pub struct PrefetchRequest {
    pub query: String,
    pub collection: Option<String>,
    pub profile: Option<String>,
    /// Explicit TTL override from the caller; otherwise the popularity
    /// axis recommends one.
    pub ttl_override: Option<Duration>,
}

#[derive(Clone)]
pub struct Prefetcher {
    store: CacheStore,
    origin: Arc<OriginClient>,
    ttl_policy: Arc<TtlPolicy>,
    popularity: Arc<PopularityTracker>,
    metrics: Arc<Metrics>,
    fetch_timeout: Duration,
}

impl Prefetcher {
    pub fn new(
        store: CacheStore,
        origin: Arc<OriginClient>,
        ttl_policy: Arc<TtlPolicy>,
        popularity: Arc<PopularityTracker>,
        metrics: Arc<Metrics>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            origin,
            ttl_policy,
            popularity,
            metrics,
            fetch_timeout,
        }
    }

    /// Schedule a prefetch and return the cache key it will populate.
    ///
    /// Returns immediately; the fetch-and-store pipeline runs in a spawned
    /// task whose completion or failure is observable only via metrics.
    pub fn schedule(&self, request: PrefetchRequest) -> String {
        let key = search_key(
            &request.query,
            request.collection.as_deref(),
            request.profile.as_deref(),
        );
        self.metrics.record_prefetch(PrefetchOutcome::Scheduled);

        let worker = self.clone();
        let task_key = key.clone();
        tokio::spawn(async move {
            worker.execute(task_key, request).await;
        });
        key
    }

    async fn execute(&self, key: String, request: PrefetchRequest) {
        if self.store.exists(&key).await {
            debug!(key, "prefetch skipped, already cached");
            self.metrics.record_prefetch(PrefetchOutcome::SkippedCached);
            return;
        }

        let start = Instant::now();
        let origin_request = OriginRequest {
            kind: KeyKind::Search,
            query: request.query.clone(),
            collection: request.collection.clone(),
            profile: request.profile.clone(),
            session_id: None,
            tab_filters: Vec::new(),
        };

        let response =
            match tokio::time::timeout(self.fetch_timeout, self.origin.fetch(&origin_request)).await
            {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    // Best-effort by design: an abandoned or failed prefetch
                    // is wasted work, never a user-visible error.
                    debug!(key, error = %e, "prefetch origin fetch failed");
                    self.metrics.record_prefetch(PrefetchOutcome::Failed);
                    return;
                }
                Err(_) => {
                    debug!(
                        key,
                        timeout = fmt_duration(self.fetch_timeout),
                        "prefetch origin fetch timed out"
                    );
                    self.metrics.record_prefetch(PrefetchOutcome::Failed);
                    return;
                }
            };

        let ttl = match request.ttl_override {
            Some(ttl) => ttl,
            None => self
                .ttl_policy
                .recommended_ttl(&request.query, self.ttl_policy.tiers().search),
        };
        let format = PayloadFormat::detect(response.content_type.as_deref(), &response.body);
        let entry = CacheEntry::new(response.body, format, ttl);

        if self.store.set(&key, &entry).await {
            self.popularity.record(&request.query);
            debug!(
                key,
                ttl_seconds = entry.ttl_seconds,
                elapsed = fmt_duration(start.elapsed()),
                "prefetch cached"
            );
            self.metrics.record_prefetch(PrefetchOutcome::Completed);
        } else {
            warn!(key, "prefetch fetched but cache write failed");
            self.metrics.record_prefetch(PrefetchOutcome::Failed);
        }
    }
}
