//! Segment store trait

use super::segment::{Segment, SegmentInfo};
use crate::error::{Error, Result};
use crate::progress::GenerationProgress;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Build lifecycle of a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::NotStarted => "not_started",
            GenerationStatus::InProgress => "in_progress",
            GenerationStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "not_started" => Ok(GenerationStatus::NotStarted),
            "in_progress" => Ok(GenerationStatus::InProgress),
            "completed" => Ok(GenerationStatus::Completed),
            other => Err(Error::InvalidArgument(format!(
                "unknown generation status '{}'",
                other
            ))),
        }
    }
}

/// Singleton metadata record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub generation_status: GenerationStatus,
    pub target_prime_count: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Store-level statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Highest committed prime index (0 for an empty store)
    pub max_prime_index: u64,
    pub total_segments: u64,
    pub status: GenerationStatus,
    pub target_count: u64,
    /// Sum of all compressed gap blocks
    pub compressed_bytes: u64,
}

impl StoreStats {
    pub fn from_segments(segments: &[SegmentInfo], metadata: &StoreMetadata) -> Self {
        Self {
            max_prime_index: segments.last().map_or(0, |s| s.end_index),
            total_segments: segments.len() as u64,
            status: metadata.generation_status,
            target_count: metadata.target_prime_count,
            compressed_bytes: segments.iter().map(|s| s.compressed_len).sum(),
        }
    }
}

/// Storage contract for persisted prime segments
///
/// Segments are appended by a single builder in strictly increasing id and
/// index order and become visible to readers only once fully written.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Resolve the unique segment whose index range contains `index`.
    ///
    /// Fails with `NotFound` when no committed segment covers it.
    async fn find_segment_for_index(&self, index: u64) -> Result<Segment>;

    /// Boundary metadata of the segment containing `index`, without
    /// reading its gap block.
    async fn find_segment_info(&self, index: u64) -> Result<SegmentInfo>;

    /// Persist the next segment. Fails with `GenerationFailure` if it does
    /// not continue the existing sequence.
    async fn append_segment(&self, segment: Segment) -> Result<SegmentInfo>;

    /// Most recently committed segment
    async fn last_segment(&self) -> Result<Option<Segment>>;

    /// Boundary metadata of all committed segments, ascending
    async fn segments(&self) -> Result<Vec<SegmentInfo>>;

    async fn metadata(&self) -> Result<StoreMetadata>;

    async fn set_status(&self, status: GenerationStatus) -> Result<()>;

    async fn set_target(&self, target_prime_count: u64) -> Result<()>;

    async fn progress(&self) -> Result<Option<GenerationProgress>>;

    async fn write_progress(&self, progress: &GenerationProgress) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;

    /// Pick up segments committed by another process since the last scan.
    ///
    /// Returns the number of newly visible segments.
    async fn refresh(&self) -> Result<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() -> Result<()> {
        for status in [
            GenerationStatus::NotStarted,
            GenerationStatus::InProgress,
            GenerationStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<GenerationStatus>()?, status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
        assert!("building".parse::<GenerationStatus>().is_err());
        Ok(())
    }

    #[test]
    fn test_stats_from_segments() {
        let segments = vec![
            SegmentInfo {
                segment_id: 0,
                start_index: 1,
                end_index: 100,
                start_prime: 2,
                segment_size: 100,
                compressed_len: 99,
            },
            SegmentInfo {
                segment_id: 1,
                start_index: 101,
                end_index: 150,
                start_prime: 547,
                segment_size: 50,
                compressed_len: 49,
            },
        ];
        let metadata = StoreMetadata {
            generation_status: GenerationStatus::InProgress,
            target_prime_count: 1000,
            updated_at: None,
        };

        let stats = StoreStats::from_segments(&segments, &metadata);
        assert_eq!(stats.max_prime_index, 150);
        assert_eq!(stats.total_segments, 2);
        assert_eq!(stats.status, GenerationStatus::InProgress);
        assert_eq!(stats.target_count, 1000);
        assert_eq!(stats.compressed_bytes, 148);

        let empty = StoreStats::from_segments(&[], &StoreMetadata::default());
        assert_eq!(empty.max_prime_index, 0);
        assert_eq!(empty.status, GenerationStatus::NotStarted);
    }
}
