//! In-process TTL key-value store.
//!
//! Backs the list-response cache (keyed by full request path), the GPS
//! last-point cache (`gps-point-{sn}`) and one-time login codes. Entries are
//! JSON values with an optional expiry; expired entries are dropped lazily on
//! access and by a periodic sweep from the background worker.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde_json::Value as JsonValue;

#[derive(Debug, Clone)]
struct Entry {
    value: JsonValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Thread-safe TTL cache of JSON values.
#[derive(Debug, Default)]
pub struct TtlCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value with an optional time-to-live.
    pub fn set(&self, key: impl Into<String>, value: JsonValue, ttl: Option<Duration>) {
        let entry = Entry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries
            .write()
            .expect("ttl cache poisoned")
            .insert(key.into(), entry);
    }

    /// Fetch a value, dropping it if expired.
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        let now = Instant::now();
        {
            let entries = self.entries.read().expect("ttl cache poisoned");
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: upgrade to a write lock and evict.
        self.entries.write().expect("ttl cache poisoned").remove(key);
        None
    }

    /// Remove and return a value (single-use reads, e.g. login codes).
    pub fn take(&self, key: &str) -> Option<JsonValue> {
        let now = Instant::now();
        let entry = self
            .entries
            .write()
            .expect("ttl cache poisoned")
            .remove(key)?;
        if entry.is_expired(now) {
            None
        } else {
            Some(entry.value)
        }
    }

    /// Remove a value.
    pub fn remove(&self, key: &str) {
        self.entries.write().expect("ttl cache poisoned").remove(key);
    }

    /// Drop all expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("ttl cache poisoned");
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("ttl cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_round_trip() {
        let cache = TtlCache::new();
        cache.set("k", json!({"a": 1}), None);
        assert_eq!(cache.get("k"), Some(json!({"a": 1})));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = TtlCache::new();
        cache.set("k", json!(1), Some(Duration::from_millis(0)));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_take_is_single_use() {
        let cache = TtlCache::new();
        cache.set("code", json!("123456"), Some(Duration::from_secs(60)));
        assert_eq!(cache.take("code"), Some(json!("123456")));
        assert_eq!(cache.take("code"), None);
    }

    #[test]
    fn test_purge_expired() {
        let cache = TtlCache::new();
        cache.set("a", json!(1), Some(Duration::from_millis(0)));
        cache.set("b", json!(2), None);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
