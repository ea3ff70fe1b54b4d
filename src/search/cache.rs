//! TTL cache of search results.
//!
//! Entries expire after the TTL. Once the map grows past `max_entries`, an
//! insert sweeps out expired entries only; live entries are never evicted.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{SearchOptions, SearchResult};

struct CacheEntry {
    results: Vec<SearchResult>,
    inserted: Instant,
}

pub struct SearchCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl SearchCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Canonical key for a query and its options.
    pub fn key(query: &str, options: &SearchOptions) -> String {
        let options = serde_json::to_string(options).unwrap_or_default();
        format!("{}\u{1f}{options}", query.trim().to_lowercase())
    }

    pub fn get(&self, key: &str) -> Option<Vec<SearchResult>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => Some(entry.results.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, results: Vec<SearchResult>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                results,
                inserted: Instant::now(),
            },
        );
        if entries.len() > self.max_entries {
            let before = entries.len();
            entries.retain(|_, entry| entry.inserted.elapsed() < self.ttl);
            tracing::debug!(removed = before - entries.len(), "search cache sweep");
        }
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_case_and_padding_but_not_options() {
        let opts = SearchOptions::default();
        assert_eq!(SearchCache::key(" Auth ", &opts), SearchCache::key("auth", &opts));
        let other = SearchOptions {
            limit: 3,
            ..Default::default()
        };
        assert_ne!(SearchCache::key("auth", &opts), SearchCache::key("auth", &other));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = SearchCache::new(Duration::from_millis(0), 100);
        cache.insert("k".into(), Vec::new());
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn live_entries_survive_the_sweep() {
        let cache = SearchCache::new(Duration::from_secs(300), 2);
        for i in 0..5 {
            cache.insert(format!("k{i}"), Vec::new());
        }
        assert_eq!(cache.len(), 5);
        assert!(cache.get("k0").is_some());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn sweep_removes_expired_entries() {
        let cache = SearchCache::new(Duration::from_millis(0), 2);
        for i in 0..3 {
            cache.insert(format!("k{i}"), Vec::new());
        }
        // the sweep on the third insert drops everything already expired
        assert!(cache.len() <= 1);
    }
}
