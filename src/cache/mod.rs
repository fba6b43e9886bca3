//! Two-tier cache in front of the segment store
//!
//! The segment tier holds fully reconstructed segments keyed by segment id.
//! The point tier holds individual `index → prime` answers. Both are
//! bounded and can be rebuilt from the store at any time.

mod bounded;

pub use bounded::{BoundedCache, EvictionPolicy};

use crate::config::CacheConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Cache for decompressed segments and individual lookups
pub struct PrimeCache {
    segments: Mutex<BoundedCache<u64, Arc<[u64]>>>,
    points: Mutex<BoundedCache<u64, u64>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PrimeCache {
    pub fn new(segment_capacity: usize, point_capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            segments: Mutex::new(BoundedCache::new(segment_capacity, policy)),
            points: Mutex::new(BoundedCache::new(point_capacity, policy)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.segment_capacity,
            config.point_capacity(),
            config.policy,
        )
    }

    /// Point tier lookup. Counts a hit when found.
    pub fn get_point(&self, index: u64) -> Option<u64> {
        let prime = self.points.lock().get(&index);
        if prime.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        prime
    }

    pub fn insert_point(&self, index: u64, prime: u64) {
        self.points.lock().insert(index, prime);
    }

    /// Segment tier lookup. Counts a hit when found and a miss otherwise,
    /// so every lookup that misses the point tier is counted once.
    pub fn get_segment(&self, segment_id: u64) -> Option<Arc<[u64]>> {
        let primes = self.segments.lock().get(&segment_id);
        match primes {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        primes
    }

    pub fn insert_segment(&self, segment_id: u64, primes: Arc<[u64]>) {
        if let Some(evicted) = self.segments.lock().insert(segment_id, primes) {
            trace!(segment = evicted, "Evicted segment from cache");
        }
    }

    pub fn clear(&self) {
        self.segments.lock().clear();
        self.points.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        let segments = self.segments.lock();
        let points = self.points.lock();
        CacheStats {
            hits,
            misses,
            hit_rate,
            segment_entries: segments.len(),
            point_entries: points.len(),
            segment_capacity: segments.capacity(),
            point_capacity: points.capacity(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub segment_entries: usize,
    pub point_entries: usize,
    pub segment_capacity: usize,
    pub point_capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prime_cache_counts() {
        let cache = PrimeCache::new(2, 20, EvictionPolicy::InsertionOrder);

        assert!(cache.get_point(1).is_none());
        assert!(cache.get_segment(0).is_none());
        cache.insert_segment(0, Arc::from(vec![2u64, 3, 5]));
        cache.insert_point(1, 2);

        assert_eq!(cache.get_point(1), Some(2));
        assert_eq!(cache.get_segment(0).as_deref(), Some(&[2u64, 3, 5][..]));

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.segment_entries, 1);
        assert_eq!(stats.point_entries, 1);
        assert_eq!(stats.point_capacity, 20);
    }

    #[test]
    fn test_segment_tier_bounded() {
        let cache = PrimeCache::new(2, 10, EvictionPolicy::InsertionOrder);
        for id in 0..3u64 {
            cache.insert_segment(id, Arc::from(vec![id]));
        }
        assert!(cache.get_segment(0).is_none());
        assert!(cache.get_segment(2).is_some());
        assert_eq!(cache.stats().segment_entries, 2);

        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.segment_entries, 0);
        assert_eq!(stats.point_entries, 0);
    }
}
