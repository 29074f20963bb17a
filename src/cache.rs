use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

use crate::metrics::{CACHE_HITS, CACHE_MISSES};

// Cache entry with timestamp
#[derive(Clone)]
pub struct CacheEntry {
    pub response: String,
    pub created_at: Instant,
}

// Create a cache key (hash of namespace + payload)
pub fn make_cache_key(namespace: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace);
    hasher.update([0u8]);
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}

// Serialized upstream responses, valid for `ttl`
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
            .map(|entry| entry.response.clone());

        match hit {
            Some(_) => CACHE_HITS.inc(),
            None => CACHE_MISSES.inc(),
        }
        hit
    }

    pub fn insert(&self, key: String, response: String) {
        self.entries.insert(
            key,
            CacheEntry {
                response,
                created_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_depend_on_namespace_and_payload() {
        let a = make_cache_key("translate", "hello world");
        assert_eq!(a, make_cache_key("translate", "hello world"));
        assert_ne!(a, make_cache_key("ranking", "hello world"));
        assert_ne!(a, make_cache_key("translate", "hello world!"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("k".to_string(), "v".to_string());
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        let expired = ResponseCache::new(Duration::ZERO);
        expired.insert("k".to_string(), "v".to_string());
        assert_eq!(expired.get("k"), None);
    }
}
