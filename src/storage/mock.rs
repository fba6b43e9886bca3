//! Mock segment store for testing
//!
//! In-memory store that counts how often segments and boundaries are
//! fetched, so tests can prove which lookups reached storage.

use super::engine::{GenerationStatus, SegmentStore, StoreMetadata, StoreStats};
use super::segment::{check_continuation, Segment, SegmentInfo};
use crate::error::{Error, Result};
use crate::progress::GenerationProgress;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory segment store
#[derive(Clone, Default)]
pub struct MockSegmentStore {
    segments: Arc<RwLock<Vec<Segment>>>,
    metadata: Arc<RwLock<StoreMetadata>>,
    progress: Arc<RwLock<Option<GenerationProgress>>>,
    find_calls: Arc<AtomicUsize>,
    info_calls: Arc<AtomicUsize>,
}

impl MockSegmentStore {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `primes` (starting at index 1) in segments of `segment_size`.
    pub fn from_primes(primes: &[u64], segment_size: usize) -> Result<Self> {
        let store = Self::new();
        {
            let mut segments = store.segments.write();
            for (id, chunk) in primes.chunks(segment_size.max(1)).enumerate() {
                let start_index = segments.last().map_or(1, |s: &Segment| s.end_index + 1);
                segments.push(Segment::from_primes(id as u64, start_index, chunk)?);
            }
        }
        Ok(store)
    }

    /// Number of `find_segment_for_index` calls so far
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Number of `find_segment_info` calls so far
    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    fn locate(&self, index: u64) -> Result<Segment> {
        let segments = self.segments.read();
        let position = segments.partition_point(|s| s.end_index < index);
        match segments.get(position) {
            Some(segment) if segment.contains(index) => Ok(segment.clone()),
            _ => Err(Error::NotFound(index)),
        }
    }

    pub fn len(&self) -> usize {
        self.segments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.read().is_empty()
    }
}

#[async_trait]
impl SegmentStore for MockSegmentStore {
    async fn find_segment_for_index(&self, index: u64) -> Result<Segment> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.locate(index)
    }

    async fn find_segment_info(&self, index: u64) -> Result<SegmentInfo> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        self.locate(index).map(|segment| segment.info())
    }

    async fn append_segment(&self, segment: Segment) -> Result<SegmentInfo> {
        let mut segments = self.segments.write();
        let last = segments.last().map(Segment::info);
        check_continuation(last.as_ref(), &segment)?;
        let info = segment.info();
        segments.push(segment);
        Ok(info)
    }

    async fn last_segment(&self) -> Result<Option<Segment>> {
        Ok(self.segments.read().last().cloned())
    }

    async fn segments(&self) -> Result<Vec<SegmentInfo>> {
        Ok(self.segments.read().iter().map(Segment::info).collect())
    }

    async fn metadata(&self) -> Result<StoreMetadata> {
        Ok(self.metadata.read().clone())
    }

    async fn set_status(&self, status: GenerationStatus) -> Result<()> {
        self.metadata.write().generation_status = status;
        Ok(())
    }

    async fn set_target(&self, target_prime_count: u64) -> Result<()> {
        self.metadata.write().target_prime_count = target_prime_count;
        Ok(())
    }

    async fn progress(&self) -> Result<Option<GenerationProgress>> {
        Ok(self.progress.read().clone())
    }

    async fn write_progress(&self, progress: &GenerationProgress) -> Result<()> {
        *self.progress.write() = Some(progress.clone());
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let infos: Vec<SegmentInfo> = self.segments.read().iter().map(Segment::info).collect();
        Ok(StoreStats::from_segments(&infos, &self.metadata.read()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_store_lookup_and_counting() -> Result<()> {
        let store = MockSegmentStore::from_primes(&[2, 3, 5, 7, 11, 13, 17], 3)?;
        assert_eq!(store.len(), 3);

        let segment = store.find_segment_for_index(4).await?;
        assert_eq!(segment.segment_id, 1);
        assert_eq!(segment.primes()?, vec![7, 11, 13]);

        assert!(matches!(
            store.find_segment_for_index(8).await,
            Err(Error::NotFound(8))
        ));
        assert_eq!(store.find_calls(), 2);

        assert_eq!(store.find_segment_info(7).await?.segment_id, 2);
        assert_eq!(store.info_calls(), 1);
        assert_eq!(store.find_calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_mock_store_append_checks_sequence() -> Result<()> {
        let store = MockSegmentStore::new();
        assert!(store.is_empty());

        store
            .append_segment(Segment::from_primes(0, 1, &[2, 3])?)
            .await?;
        let result = store
            .append_segment(Segment::from_primes(1, 4, &[7])?)
            .await;
        assert!(matches!(result, Err(Error::GenerationFailure(_))));

        store.set_status(GenerationStatus::Completed).await?;
        let stats = store.stats().await?;
        assert_eq!(stats.max_prime_index, 2);
        assert_eq!(stats.status, GenerationStatus::Completed);
        Ok(())
    }
}
