//! Bounded TTL cache for provider results.
//!
//! Constructed once per process and handed to the components that need it.
//! Entries are immutable once written and simply expire; nothing negative
//! (errors, empty results) is ever cached by the read-through helper.

use lru::LruCache;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::types::config::CacheConfig;

struct Entry<V> {
    value: Arc<V>,
    inserted_at: Instant,
}

/// LRU cache with per-entry time to live.
pub struct TtlCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
}

impl<K: Hash + Eq + Clone, V> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity, config.ttl)
    }

    /// Get a live entry, evicting it if expired.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(Arc::clone(&entry.value));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    /// Insert a value. An existing live entry is left untouched.
    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(&key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Arc::clone(&entry.value);
            }
        }
        let value = Arc::new(value);
        entries.put(
            key,
            Entry {
                value: Arc::clone(&value),
                inserted_at: Instant::now(),
            },
        );
        value
    }

    /// Read-through: return the cached value or compute, caching only when
    /// `should_cache` accepts the computed value.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: K,
        should_cache: impl Fn(&V) -> bool,
        compute: F,
    ) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key) {
            tracing::debug!("Cache hit");
            return Ok(hit);
        }
        let value = compute().await?;
        if should_cache(&value) {
            Ok(self.insert(key, value))
        } else {
            Ok(Arc::new(value))
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_expire() {
        let cache: TtlCache<String, u32> = TtlCache::new(4, Duration::from_millis(0));
        cache.insert("a".to_string(), 1);
        assert!(cache.get(&"a".to_string()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_are_immutable() {
        let cache: TtlCache<String, u32> = TtlCache::new(4, Duration::from_secs(60));
        cache.insert("a".to_string(), 1);
        cache.insert("a".to_string(), 2);
        assert_eq!(*cache.get(&"a".to_string()).unwrap(), 1);
    }

    #[test]
    fn test_capacity_is_bounded() {
        let cache: TtlCache<u32, u32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert(1, 1);
        cache.insert(2, 2);
        cache.insert(3, 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&1).is_none());
    }

    #[tokio::test]
    async fn test_read_through_skips_negative_results() {
        let cache: TtlCache<&'static str, Vec<u32>> = TtlCache::new(4, Duration::from_secs(60));

        let empty = cache
            .get_or_try_insert_with("q", |v| !v.is_empty(), || async { Ok::<_, ()>(vec![]) })
            .await
            .unwrap();
        assert!(empty.is_empty());
        assert!(cache.get(&"q").is_none());

        let full = cache
            .get_or_try_insert_with("q", |v| !v.is_empty(), || async { Ok::<_, ()>(vec![1]) })
            .await
            .unwrap();
        assert_eq!(*full, vec![1]);
        assert!(cache.get(&"q").is_some());
    }
}
