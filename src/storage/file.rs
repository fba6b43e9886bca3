//! Directory-backed segment store
//!
//! ```text
//! <data_dir>/
//!   ├─→ segments.log    append-only segment records
//!   ├─→ metadata.json   {generation_status, target_prime_count}
//!   └─→ progress.json   latest GenerationProgress
//! ```
//!
//! Singleton records are read from disk on every call so that a query
//! process sees status changes made by a concurrently running builder.

use super::engine::{GenerationStatus, SegmentStore, StoreMetadata, StoreStats};
use super::log::SegmentLog;
use super::segment::{Segment, SegmentInfo};
use super::singleton::{read_json, write_json_atomic};
use crate::error::Result;
use crate::progress::GenerationProgress;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const METADATA_FILE_NAME: &str = "metadata.json";
pub const PROGRESS_FILE_NAME: &str = "progress.json";

/// Open (or create) the store at `path`.
pub fn initialize_store<P: AsRef<Path>>(path: P) -> Result<FileSegmentStore> {
    FileSegmentStore::open(path)
}

/// Segment store kept in one directory
pub struct FileSegmentStore {
    base_path: PathBuf,
    log: SegmentLog,
    /// Serializes read-modify-write of metadata.json within this process
    metadata_lock: Mutex<()>,
}

impl FileSegmentStore {
    /// Create or open a store directory
    pub fn open<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        info!(path = ?base_path, "Opening segment store");

        let log = SegmentLog::open(&base_path)?;
        let store = Self {
            base_path,
            log,
            metadata_lock: Mutex::new(()),
        };

        if read_json::<StoreMetadata>(&store.metadata_path())?.is_none() {
            write_json_atomic(&store.metadata_path(), &StoreMetadata::default())?;
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    /// Bytes used by the segment log
    pub fn log_size_bytes(&self) -> u64 {
        self.log.size_bytes()
    }

    fn metadata_path(&self) -> PathBuf {
        self.base_path.join(METADATA_FILE_NAME)
    }

    fn progress_path(&self) -> PathBuf {
        self.base_path.join(PROGRESS_FILE_NAME)
    }

    fn read_metadata(&self) -> Result<StoreMetadata> {
        Ok(read_json(&self.metadata_path())?.unwrap_or_default())
    }

    fn update_metadata(&self, update: impl FnOnce(&mut StoreMetadata)) -> Result<()> {
        let _guard = self.metadata_lock.lock();
        let mut metadata = self.read_metadata()?;
        update(&mut metadata);
        metadata.updated_at = Some(chrono::Utc::now());
        write_json_atomic(&self.metadata_path(), &metadata)
    }
}

#[async_trait]
impl SegmentStore for FileSegmentStore {
    async fn find_segment_for_index(&self, index: u64) -> Result<Segment> {
        self.log.find(index)
    }

    async fn find_segment_info(&self, index: u64) -> Result<SegmentInfo> {
        self.log.find_info(index)
    }

    async fn append_segment(&self, segment: Segment) -> Result<SegmentInfo> {
        self.log.append(&segment)
    }

    async fn last_segment(&self) -> Result<Option<Segment>> {
        self.log.last()
    }

    async fn segments(&self) -> Result<Vec<SegmentInfo>> {
        Ok(self.log.infos())
    }

    async fn metadata(&self) -> Result<StoreMetadata> {
        self.read_metadata()
    }

    async fn set_status(&self, status: GenerationStatus) -> Result<()> {
        self.update_metadata(|metadata| metadata.generation_status = status)?;
        debug!(%status, "Generation status updated");
        Ok(())
    }

    async fn set_target(&self, target_prime_count: u64) -> Result<()> {
        self.update_metadata(|metadata| metadata.target_prime_count = target_prime_count)
    }

    async fn progress(&self) -> Result<Option<GenerationProgress>> {
        read_json(&self.progress_path())
    }

    async fn write_progress(&self, progress: &GenerationProgress) -> Result<()> {
        write_json_atomic(&self.progress_path(), progress)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let metadata = self.read_metadata()?;
        Ok(StoreStats::from_segments(&self.log.infos(), &metadata))
    }

    async fn refresh(&self) -> Result<usize> {
        self.log.refresh()
    }
}
