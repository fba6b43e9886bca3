//! Storage layer
//!
//! # Architecture
//!
//! ```text
//! SegmentStore (trait)
//!   ├─→ FileSegmentStore   segments.log + metadata.json + progress.json
//!   └─→ MockSegmentStore   in-memory, counts lookups
//! ```
//!
//! Segments are immutable once appended. Each covers a contiguous index
//! range and stores its first prime plus the varint-compressed gaps to the
//! rest, so one segment decodes without touching any other.
//!
//! ## Segment log
//!
//! Records are `[len: u32][payload][crc32: u32]`. The in-memory boundary
//! index is rebuilt by scanning the log on open; a torn trailing record is
//! dropped and overwritten by the next append.

pub mod engine;
pub mod file;
pub mod log;
pub mod mock;
pub mod segment;
pub mod singleton;

pub use engine::{GenerationStatus, SegmentStore, StoreMetadata, StoreStats};
pub use file::{initialize_store, FileSegmentStore};
pub use log::SegmentLog;
pub use mock::MockSegmentStore;
pub use segment::{check_continuation, Segment, SegmentInfo};
