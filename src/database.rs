//! Query façade over a segment store
//!
//! ```text
//! get_prime_by_index(k)
//!   ├─→ point tier hit ─────────────────────────→ prime
//!   └─→ store: boundaries of the segment covering k
//!        ├─→ segment tier hit ──→ offset k ──────→ prime
//!        └─→ read + decompress, cache ──→ offset k → prime
//! ```

use crate::cache::{CacheStats, PrimeCache};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::storage::{SegmentInfo, SegmentStore, StoreStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// One entry of a range query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPrime {
    pub index: u64,
    pub prime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cached, read-only access to a prime store
pub struct PrimeDatabase {
    store: Arc<dyn SegmentStore>,
    cache: PrimeCache,
    max_range_len: u64,
}

impl PrimeDatabase {
    pub fn new(store: Arc<dyn SegmentStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            cache: PrimeCache::from_config(config),
            max_range_len: config.max_range_len,
        }
    }

    pub fn store(&self) -> &Arc<dyn SegmentStore> {
        &self.store
    }

    /// Return the `index`-th prime (1-based).
    ///
    /// Fails with `OutOfRange` for `index <= 0` and `NotFound` when the
    /// index has not been generated yet.
    pub async fn get_prime_by_index(&self, index: i64) -> Result<u64> {
        let index = positive_index(index)?;

        if let Some(prime) = self.cache.get_point(index) {
            return Ok(prime);
        }

        let segment = self.resolve_segment(index).await?;
        let primes = match self.cache.get_segment(segment.segment_id) {
            Some(primes) => primes,
            None => {
                debug!(segment = segment.segment_id, "Decompressing segment");
                let stored = self.store.find_segment_for_index(index).await?;
                let primes: Arc<[u64]> = stored.primes()?.into();
                self.cache.insert_segment(segment.segment_id, Arc::clone(&primes));
                primes
            }
        };

        let offset = (index - segment.start_index) as usize;
        let prime = primes.get(offset).copied().ok_or_else(|| {
            Error::MalformedEncoding(format!(
                "segment {} holds {} primes, index {} needs offset {}",
                segment.segment_id,
                primes.len(),
                index,
                offset
            ))
        })?;

        self.cache.insert_point(index, prime);
        Ok(prime)
    }

    /// Store statistics, after picking up segments written by a builder
    /// in another process.
    pub async fn get_stats(&self) -> Result<StoreStats> {
        self.store.refresh().await?;
        self.store.stats().await
    }

    pub async fn is_index_available(&self, index: i64) -> Result<bool> {
        if index <= 0 {
            return Ok(false);
        }
        Ok(index as u64 <= self.get_stats().await?.max_prime_index)
    }

    /// Primes for `start..=end`. Per-index failures are reported inline.
    pub async fn get_primes_by_index_range(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<IndexedPrime>> {
        let first = positive_index(start)?;
        if end < start {
            return Err(Error::InvalidArgument(format!(
                "range end {} is before start {}",
                end, start
            )));
        }

        let len = (end - start) as u64 + 1;
        if len > self.max_range_len {
            return Err(Error::InvalidArgument(format!(
                "range of {} indices exceeds the limit of {}",
                len, self.max_range_len
            )));
        }

        let mut entries = Vec::with_capacity(len as usize);
        for index in first..first + len {
            let entry = match self.get_prime_by_index(index as i64).await {
                Ok(prime) => IndexedPrime {
                    index,
                    prime: Some(prime),
                    error: None,
                },
                Err(e) => IndexedPrime {
                    index,
                    prime: None,
                    error: Some(e.to_string()),
                },
            };
            entries.push(entry);
        }
        Ok(entries)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn resolve_segment(&self, index: u64) -> Result<SegmentInfo> {
        match self.store.find_segment_info(index).await {
            Err(Error::NotFound(_)) => {
                // The builder may have appended since our last scan
                if self.store.refresh().await? > 0 {
                    self.store.find_segment_info(index).await
                } else {
                    Err(Error::NotFound(index))
                }
            }
            Err(e) => {
                warn!(index, error = %e, "Segment lookup failed");
                Err(e)
            }
            found => found,
        }
    }
}

fn positive_index(index: i64) -> Result<u64> {
    if index <= 0 {
        return Err(Error::OutOfRange(index));
    }
    Ok(index as u64)
}
