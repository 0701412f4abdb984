//! Tiered key/value store: Redis primary, in-memory fallback.
//!
//! The store is never a hard dependency for correctness, only for speed.
//! Every primary-store I/O error is caught, logged, and surfaced as a miss
//! (`get`/`exists`) or an unsuccessful write (`set`); callers fall through
//! to a live origin fetch. Writes establish value and expiry atomically
//! (`SET ... EX`), never as two racing operations.
//!
//! An optional metrics hook observes hit/miss/set outcomes per request
//! category. The hook is infallible and sits outside the data path — a
//! broken observer can never become a cache error.

use crate::cache::entry::CacheEntry;
use crate::cache::key::KeyKind;
use crate::cache::memory::MemoryStore;
use crate::utils::fmt_duration;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// A store-level event, reported to the metrics hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Hit(KeyKind),
    Miss(KeyKind),
    Set(KeyKind),
    SetFailed(KeyKind),
    /// A primary-store I/O error that was degraded to a miss.
    Error,
}

pub type StoreHook = Arc<dyn Fn(StoreEvent) + Send + Sync>;

#[derive(Clone)]
enum Backend {
    Redis(ConnectionManager),
    Memory(Arc<MemoryStore>),
}

#[derive(Clone)]
pub struct CacheStore {
    backend: Backend,
    hook: Option<StoreHook>,
}

impl CacheStore {
    /// Connect to the primary store, degrading to the in-memory fallback if
    /// Redis is not configured or unreachable within `connect_timeout`.
    pub async fn connect(
        redis_url: Option<&str>,
        connect_timeout: Duration,
        hook: Option<StoreHook>,
    ) -> Self {
        let Some(url) = redis_url else {
            info!("no REDIS_URL configured, using in-memory cache");
            return Self::memory(hook);
        };

        let start = Instant::now();
        let manager = async {
            let client = redis::Client::open(url)?;
            ConnectionManager::new(client).await
        };

        match tokio::time::timeout(connect_timeout, manager).await {
            Ok(Ok(manager)) => {
                info!(elapsed = fmt_duration(start.elapsed()), "redis cache connected");
                Self {
                    backend: Backend::Redis(manager),
                    hook,
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "redis unreachable, degrading to in-memory cache");
                Self::memory(hook)
            }
            Err(_) => {
                warn!(
                    timeout = fmt_duration(connect_timeout),
                    "redis connection timed out, degrading to in-memory cache"
                );
                Self::memory(hook)
            }
        }
    }

    /// A store backed purely by the process-local fallback.
    pub fn memory(hook: Option<StoreHook>) -> Self {
        Self {
            backend: Backend::Memory(Arc::new(MemoryStore::new())),
            hook,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Redis(_) => "redis",
            Backend::Memory(_) => "memory",
        }
    }

    /// Fetch and decode an entry. I/O errors and malformed values both
    /// degrade gracefully — the former to a miss, the latter to coercion.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let kind = KeyKind::from_key(key);
        let raw = match &self.backend {
            Backend::Memory(store) => store.get(key),
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                match conn.get::<_, Option<String>>(key).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(key, error = %e, "cache get failed, treating as miss");
                        self.emit(StoreEvent::Error);
                        None
                    }
                }
            }
        };

        match raw {
            Some(raw) => {
                self.emit(StoreEvent::Hit(kind));
                Some(CacheEntry::decode(&raw))
            }
            None => {
                self.emit(StoreEvent::Miss(kind));
                None
            }
        }
    }

    /// Write an entry with its TTL. Returns whether the write landed.
    pub async fn set(&self, key: &str, entry: &CacheEntry) -> bool {
        let kind = KeyKind::from_key(key);
        let ttl = entry.ttl().max(Duration::from_secs(1));
        let raw = entry.encode();

        let ok = match &self.backend {
            Backend::Memory(store) => {
                store.set(key, raw, ttl);
                true
            }
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                // SET with EX establishes value and expiry in one command.
                match conn.set_ex::<_, _, ()>(key, raw, ttl.as_secs()).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(key, error = %e, "cache set failed");
                        false
                    }
                }
            }
        };

        self.emit(if ok {
            StoreEvent::Set(kind)
        } else {
            StoreEvent::SetFailed(kind)
        });
        ok
    }

    pub async fn exists(&self, key: &str) -> bool {
        match &self.backend {
            Backend::Memory(store) => store.exists(key),
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                match conn.exists::<_, bool>(key).await {
                    Ok(exists) => exists,
                    Err(e) => {
                        warn!(key, error = %e, "cache exists check failed, treating as miss");
                        self.emit(StoreEvent::Error);
                        false
                    }
                }
            }
        }
    }

    /// Remaining lifetime in whole seconds, `None` if absent or unexpiring.
    pub async fn ttl_remaining(&self, key: &str) -> Option<i64> {
        match &self.backend {
            Backend::Memory(store) => store.ttl_remaining(key),
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                match conn.ttl::<_, i64>(key).await {
                    // Redis: -2 = missing, -1 = no expiry.
                    Ok(ttl) if ttl >= 0 => Some(ttl),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(key, error = %e, "cache ttl check failed");
                        self.emit(StoreEvent::Error);
                        None
                    }
                }
            }
        }
    }

    /// Delete every key matching a glob pattern (single `*` wildcard).
    /// Returns the number of keys removed.
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        match &self.backend {
            Backend::Memory(store) => store.delete_pattern(pattern),
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let keys: Vec<String> = {
                    let mut iter = match conn.scan_match::<_, String>(pattern).await {
                        Ok(iter) => iter,
                        Err(e) => {
                            warn!(pattern, error = %e, "cache pattern scan failed");
                            self.emit(StoreEvent::Error);
                            return 0;
                        }
                    };
                    let mut keys = Vec::new();
                    while let Some(key) = iter.next_item().await {
                        keys.push(key);
                    }
                    keys
                };

                if keys.is_empty() {
                    return 0;
                }
                match conn.del::<_, u64>(keys).await {
                    Ok(deleted) => deleted,
                    Err(e) => {
                        warn!(pattern, error = %e, "cache pattern delete failed");
                        self.emit(StoreEvent::Error);
                        0
                    }
                }
            }
        }
    }

    fn emit(&self, event: StoreEvent) {
        if let Some(hook) = &self.hook {
            hook(event);
        }
    }
}
