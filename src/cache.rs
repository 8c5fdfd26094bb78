//! Injected cache capability used by the embedding client and vector store.
//!
//! Payloads are serialized strings so callers control encoding; a corrupt
//! payload must decode-fail at the call site and fall through to the backing
//! store rather than surface an error.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Key/value cache with per-entry TTL.
///
/// A TTL of zero means the entry does not expire.
pub trait ObjectCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String, ttl: Duration);
    fn delete(&self, key: &str);
    fn flush(&self);
}

/// In-process cache backed by a mutexed map with lazy expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryCache {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectCache for MemoryCache {
    #[inline]
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;

        let entry = entries.get(key)?.clone();
        if entry.expires_at.is_some_and(|at| Instant::now() >= at) {
            entries.remove(key);
            return None;
        }

        Some(entry.value)
    }

    #[inline]
    fn set(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        };

        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), CacheEntry { value, expires_at });
        }
    }

    #[inline]
    fn delete(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    #[inline]
    fn flush(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let cache = MemoryCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn get_missing_key() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("absent"), None);
    }

    #[test]
    fn set_overwrites() {
        let cache = MemoryCache::new();
        cache.set("k", "old".to_string(), Duration::from_secs(60));
        cache.set("k", "new".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some("new".to_string()));
    }

    #[test]
    fn expired_entry_is_dropped() {
        let cache = MemoryCache::new();
        cache.set("k", "v".to_string(), Duration::from_nanos(1));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn zero_ttl_never_expires() {
        let cache = MemoryCache::new();
        cache.set("k", "v".to_string(), Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn delete_removes_entry() {
        let cache = MemoryCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(60));
        cache.delete("k");
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn flush_removes_everything() {
        let cache = MemoryCache::new();
        cache.set("a", "1".to_string(), Duration::from_secs(60));
        cache.set("b", "2".to_string(), Duration::from_secs(60));
        cache.flush();
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), None);
    }
}
