//! Application state shared across web handlers and background tasks.

use crate::cache::popularity::PopularityTracker;
use crate::cache::store::CacheStore;
use crate::cache::ttl::TtlPolicy;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::origin::{OriginClient, OriginError, OriginResponse};
use crate::prefetch::Prefetcher;
use crate::singleflight::Singleflight;
use crate::tabs::TabRules;
use anyhow::Context;
use std::sync::Arc;

/// A shared origin-fetch result. Arc-wrapped because errors are not
/// cloneable and every singleflight follower gets the same outcome.
pub type SharedFetch = Arc<Result<OriginResponse, OriginError>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: CacheStore,
    pub popularity: Arc<PopularityTracker>,
    pub ttl_policy: Arc<TtlPolicy>,
    pub tab_rules: Arc<TabRules>,
    pub origin: Arc<OriginClient>,
    pub prefetcher: Arc<Prefetcher>,
    /// Per-key dedup of cold-cache origin fetches on the standard path.
    pub origin_flights: Arc<Singleflight<SharedFetch>>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let metrics = Metrics::new();
        let store = CacheStore::connect(
            config.redis_url.as_deref(),
            config.redis_connect_timeout,
            Some(metrics.store_hook()),
        )
        .await;

        let popularity = Arc::new(PopularityTracker::new(config.popularity_capacity));
        let ttl_policy = Arc::new(TtlPolicy::new(
            config.ttl_tiers(),
            config.popularity_tiers(),
            popularity.clone(),
        ));
        let origin = Arc::new(
            OriginClient::new(&config.origin_base_url, config.origin_timeout)
                .context("Failed to create origin client")?,
        );
        let prefetcher = Arc::new(Prefetcher::new(
            store.clone(),
            origin.clone(),
            ttl_policy.clone(),
            popularity.clone(),
            metrics.clone(),
            config.prefetch_timeout,
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            popularity,
            ttl_policy,
            tab_rules: Arc::new(TabRules::default()),
            origin,
            prefetcher,
            origin_flights: Arc::new(Singleflight::new()),
            metrics,
        })
    }
}
