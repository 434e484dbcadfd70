use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Thread-safe LRU cache for query embeddings.
///
/// Caches embeddings for frequently-used queries to avoid redundant service
/// calls. Document chunks are not cached: they are embedded once per
/// pipeline run.
pub struct QueryCache {
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl QueryCache {
    /// Create a new cache with the specified capacity (clamped to >= 1)
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("Cache capacity must be at least 1");
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Get a cached embedding for a query
    pub fn get(&self, query: &str) -> Option<Vec<f32>> {
        self.cache.lock().unwrap().get(query).cloned()
    }

    /// Store an embedding in the cache
    pub fn put(&self, query: String, embedding: Vec<f32>) {
        self.cache.lock().unwrap().put(query, embedding);
    }

    /// Get the current number of cached entries
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        self.cache.lock().unwrap().clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_and_miss() {
        let cache = QueryCache::new(10);
        assert!(cache.get("query").is_none());

        cache.put("query".to_string(), vec![1.0, 2.0]);
        assert_eq!(cache.get("query"), Some(vec![1.0, 2.0]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_evicts_lru() {
        let cache = QueryCache::new(2);
        cache.put("a".to_string(), vec![1.0]);
        cache.put("b".to_string(), vec![2.0]);
        // Touch "a" so "b" is the eviction candidate
        cache.get("a");
        cache.put("c".to_string(), vec![3.0]);

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_cache_clear() {
        let cache = QueryCache::new(4);
        cache.put("a".to_string(), vec![1.0]);
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache = QueryCache::new(0);
        cache.put("a".to_string(), vec![1.0]);
        assert_eq!(cache.len(), 1);
    }
}
