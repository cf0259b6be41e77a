//! Request-scoped similarity memo backed by DashMap for lock-free concurrent
//! access while candidate items are scored in parallel.
//!
//! Entries are keyed by (query fingerprint, candidate user) so a cached
//! similarity can never leak between two different query profiles.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use userknn_core::UserId;

/// Lookup counters, reported once per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct SimilarityCache {
    store: DashMap<(u64, UserId), Option<f64>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SimilarityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: DashMap::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Cached similarity, including a cached "undefined".
    pub fn get(&self, query: u64, user_id: UserId) -> Option<Option<f64>> {
        self.store.get(&(query, user_id)).map(|entry| *entry)
    }

    /// Return the cached value or compute and remember it. Two threads racing
    /// on the same key may both compute; the results are identical.
    pub fn get_or_compute(
        &self,
        query: u64,
        user_id: UserId,
        compute: impl FnOnce() -> Option<f64>,
    ) -> Option<f64> {
        if let Some(cached) = self.get(query, user_id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return cached;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute();
        self.store.insert((query, user_id), value);
        value
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computes_once() {
        let cache = SimilarityCache::new();
        let mut calls = 0;
        let first = cache.get_or_compute(7, 1, || {
            calls += 1;
            Some(0.5)
        });
        let second = cache.get_or_compute(7, 1, || {
            calls += 1;
            Some(0.9)
        });
        assert_eq!(first, Some(0.5));
        assert_eq!(second, Some(0.5));
        assert_eq!(calls, 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_undefined_is_cached() {
        let cache = SimilarityCache::new();
        assert_eq!(cache.get_or_compute(7, 2, || None), None);
        assert_eq!(cache.get(7, 2), Some(None));
        assert_eq!(cache.get_or_compute(7, 2, || Some(1.0)), None);
    }

    #[test]
    fn test_queries_do_not_share_entries() {
        let cache = SimilarityCache::with_capacity(4);
        cache.get_or_compute(1, 5, || Some(0.1));
        cache.get_or_compute(2, 5, || Some(0.2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(1, 5), Some(Some(0.1)));
        assert_eq!(cache.get(2, 5), Some(Some(0.2)));
        assert_eq!(cache.get(3, 5), None);
    }
}
