//! Per-key deduplication of in-flight fetches.
//!
//! Two simultaneous cold-cache requests for the same key would otherwise
//! both hit origin. The first caller for a key becomes the leader and runs
//! the fetch; concurrent callers subscribe to a watch channel and receive
//! the leader's result. The map entry is cleared on completion — success or
//! failure — so a failed fetch is retried by the next request rather than
//! poisoning the key.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

pub struct Singleflight<T: Clone> {
    inflight: DashMap<String, watch::Receiver<Option<T>>>,
}

impl<T: Clone> Default for Singleflight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Singleflight<T> {
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }

    /// Run `fetch` for `key`, or await the result of an identical fetch
    /// already in flight.
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut leader_tx = None;
        let existing = match self.inflight.entry(key.to_owned()) {
            Entry::Occupied(occupied) => Some(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(None);
                vacant.insert(rx);
                leader_tx = Some(tx);
                None
            }
        };

        match existing {
            None => {
                // Leader: the guard clears the slot even if this future is
                // dropped mid-fetch, so followers can fall back.
                let _guard = ClearOnDrop {
                    inflight: &self.inflight,
                    key,
                };
                let value = fetch().await;
                if let Some(tx) = leader_tx {
                    let _ = tx.send(Some(value.clone()));
                }
                value
            }
            Some(mut rx) => {
                loop {
                    if let Some(value) = rx.borrow_and_update().clone() {
                        return value;
                    }
                    if rx.changed().await.is_err() {
                        // Leader vanished without publishing (request dropped
                        // mid-fetch). Fetch for ourselves.
                        return fetch().await;
                    }
                }
            }
        }
    }

    /// Number of keys with a fetch currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}

struct ClearOnDrop<'a, T: Clone> {
    inflight: &'a DashMap<String, watch::Receiver<Option<T>>>,
    key: &'a str,
}

impl<T: Clone> Drop for ClearOnDrop<'_, T> {
    fn drop(&mut self) {
        self.inflight.remove(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let flights: Arc<Singleflight<u64>> = Arc::new(Singleflight::new());
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let flights = flights.clone();
            let fetches = fetches.clone();
            handles.push(tokio::spawn(async move {
                flights
                    .run("search:q:c:p", || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        42u64
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn different_keys_do_not_share() {
        let flights: Arc<Singleflight<String>> = Arc::new(Singleflight::new());
        let a = flights.run("a", || async { "one".to_owned() });
        let b = flights.run("b", || async { "two".to_owned() });
        let (a, b) = tokio::join!(a, b);
        assert_eq!(a, "one");
        assert_eq!(b, "two");
    }

    #[tokio::test]
    async fn slot_clears_after_completion_allowing_refetch() {
        let flights: Arc<Singleflight<u64>> = Arc::new(Singleflight::new());
        let fetches = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let fetches = fetches.clone();
            flights
                .run("k", || async move {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    7u64
                })
                .await;
        }
        // Sequential runs each fetch — the slot only dedups overlap.
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
