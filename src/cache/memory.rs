//! In-memory fallback store.
//!
//! Used when Redis is unreachable at startup. Expiry is enforced by
//! timestamp checks on read; pattern deletes are a linear scan. This store
//! is process-local — entries are NOT shared across instances, so a
//! multi-instance deployment running in fallback mode will re-fetch
//! independently per instance.

use dashmap::DashMap;
use regex::Regex;
use std::time::{Duration, Instant};

struct StoredValue {
    raw: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(value) if value.expires_at > Instant::now() => return Some(value.raw.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: &str, raw: String, ttl: Duration) {
        self.entries.insert(
            key.to_owned(),
            StoredValue {
                raw,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remaining lifetime in whole seconds, `None` if absent or expired.
    pub fn ttl_remaining(&self, key: &str) -> Option<i64> {
        let value = self.entries.get(key)?;
        let now = Instant::now();
        if value.expires_at <= now {
            return None;
        }
        Some((value.expires_at - now).as_secs() as i64)
    }

    /// Delete every key matching a glob pattern with a single `*` wildcard.
    pub fn delete_pattern(&self, pattern: &str) -> u64 {
        let Some(regex) = glob_to_regex(pattern) else {
            return 0;
        };
        let matched: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| regex.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        let mut deleted = 0;
        for key in matched {
            if self.entries.remove(&key).is_some() {
                deleted += 1;
            }
        }
        deleted
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Translate a glob pattern (literal text plus `*` wildcards) into an
/// anchored regex.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut expression = String::with_capacity(pattern.len() + 8);
    expression.push('^');
    for (i, part) in pattern.split('*').enumerate() {
        if i > 0 {
            expression.push_str(".*");
        }
        expression.push_str(&regex::escape(part));
    }
    expression.push('$');
    Regex::new(&expression).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_exact() {
        let store = MemoryStore::new();
        for payload in ["<div>html</div>", r#"{"a":1}"#, ""] {
            store.set("k", payload.to_owned(), Duration::from_secs(60));
            assert_eq!(store.get("k").as_deref(), Some(payload));
        }
    }

    #[test]
    fn entries_expire() {
        let store = MemoryStore::new();
        store.set("gone", "x".to_owned(), Duration::from_millis(10));
        assert!(store.exists("gone"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(!store.exists("gone"));
        assert_eq!(store.get("gone"), None);
        assert_eq!(store.ttl_remaining("gone"), None);
    }

    #[test]
    fn overwrite_resets_ttl() {
        let store = MemoryStore::new();
        store.set("k", "old".to_owned(), Duration::from_millis(10));
        store.set("k", "new".to_owned(), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(store.get("k").as_deref(), Some("new"));
    }

    #[test]
    fn pattern_delete_scopes_by_prefix() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.set("tab:nursing:c:Programs", "a".to_owned(), ttl);
        store.set("tab:nursing:c:News", "b".to_owned(), ttl);
        store.set("search:nursing:c:p", "c".to_owned(), ttl);

        assert_eq!(store.delete_pattern("tab:*"), 2);
        assert!(!store.exists("tab:nursing:c:Programs"));
        assert!(store.exists("search:nursing:c:p"));
    }

    #[test]
    fn glob_is_literal_outside_the_wildcard() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.set("search:a.b:c:p", "x".to_owned(), ttl);
        store.set("search:aXb:c:p", "y".to_owned(), ttl);
        // The dot is literal, not "any character".
        assert_eq!(store.delete_pattern("search:a.b:*"), 1);
        assert!(store.exists("search:aXb:c:p"));
    }
}
